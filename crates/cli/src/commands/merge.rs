// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline merge of two snapshot files

use crate::output::{read_json, OutputFormat};
use canvass_core::{merge_with_report, MergeReport, Side, Snapshot};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args)]
pub struct MergeArgs {
    /// Snapshot of this device
    pub local: PathBuf,
    /// Snapshot read from the backing store
    pub remote: PathBuf,
    /// Describe how conflicts were decided
    #[arg(long)]
    pub report: bool,
}

#[derive(Serialize)]
struct MergeJson<'a> {
    snapshot: &'a Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a MergeReport>,
}

/// The merged snapshot goes to stdout; in text mode the report goes to stderr
pub fn handle(args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let local: Snapshot = read_json(&args.local)?;
    let remote: Snapshot = read_json(&args.remote)?;
    let outcome = merge_with_report(&local, &remote);
    tracing::debug!(report = ?outcome.report, "snapshots merged");

    match format {
        OutputFormat::Json => {
            let json = MergeJson {
                snapshot: &outcome.snapshot,
                report: args.report.then_some(&outcome.report),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
            if args.report {
                eprint!("{}", describe(&outcome.report));
            }
        }
    }
    Ok(())
}

fn describe(report: &MergeReport) -> String {
    let mut lines = vec![
        format!("completion collisions:    {}", report.completion_collisions),
        format!("superseded completions:   {}", report.superseded_completions),
        format!("undone completions:       {}", report.undone_completions),
        format!("backfilled versions:      {}", report.backfilled_versions),
        format!("arrangements from remote: {}", report.arrangements_from_remote),
        format!("day sessions from remote: {}", report.day_sessions_from_remote),
    ];
    if let Some(side) = report.addresses_from {
        let side = match side {
            Side::Local => "local",
            Side::Remote => "remote",
        };
        lines.push(format!("address list from:        {}", side));
    }
    if report.empty_list_rejected {
        lines.push("empty address list rejected".to_string());
    }
    lines.iter().map(|line| format!("{}\n", line)).collect()
}
