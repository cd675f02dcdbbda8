// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline queue commands

use super::log::format_time;
use crate::output::{or_dash, print_list, OutputFormat};
use canvass_core::{QueuedOperation, Timestamp};
use canvass_storage::StateStore;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List persisted operations waiting to be pushed
    Show,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueRow {
    id: String,
    sequence: u64,
    #[serde(rename = "type")]
    kind: String,
    attempts: u32,
    not_before: Option<Timestamp>,
    last_error: Option<String>,
}

impl From<&QueuedOperation> for QueueRow {
    fn from(item: &QueuedOperation) -> Self {
        Self {
            id: item.id().to_string(),
            sequence: item.operation.sequence,
            kind: item.operation.kind.to_string(),
            attempts: item.attempts,
            not_before: item.not_before,
            last_error: item.last_error.clone(),
        }
    }
}

impl fmt::Display for QueueRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:>6} {:<18} {:>3}  {:<24} {}",
            self.id,
            self.sequence,
            self.kind,
            self.attempts,
            or_dash(self.not_before.map(format_time)),
            self.last_error.as_deref().unwrap_or("-")
        )
    }
}

pub fn handle(command: QueueCommand, dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        QueueCommand::Show => {
            let queue = StateStore::open(dir)?.load_queue()?;
            let rows: Vec<QueueRow> = queue
                .iter()
                .flat_map(|queue| queue.items())
                .map(QueueRow::from)
                .collect();
            print_list(&rows, "No queued operations", format)
        }
    }
}
