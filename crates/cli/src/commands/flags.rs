// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protection flag commands

use super::log::format_time;
use crate::output::{or_dash, print_list, OutputFormat};
use canvass_core::{ProtectionFlag, ProtectionRegistry, SyncConfig, Timestamp};
use canvass_storage::StateStore;
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Args)]
pub struct FlagsArgs {
    #[command(subcommand)]
    pub command: FlagsCommand,
}

#[derive(Subcommand)]
pub enum FlagsCommand {
    /// List persisted flags and whether each still vetoes sync
    Show,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagRow {
    flag: ProtectionFlag,
    acquired_at: Timestamp,
    /// `None` when held until explicitly cleared
    expires_at: Option<Timestamp>,
    active: bool,
}

impl fmt::Display for FlagRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<14} {:<8} acquired {}  expires {}",
            self.flag.to_string(),
            if self.active { "active" } else { "expired" },
            format_time(self.acquired_at),
            or_dash(self.expires_at.map(format_time))
        )
    }
}

pub fn handle(
    command: FlagsCommand,
    dir: &Path,
    config: &SyncConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        FlagsCommand::Show => {
            let now = Utc::now();
            let flags = StateStore::open(dir)?.load_flags()?;
            let registry = ProtectionRegistry::from_persisted(flags, config.protection.clone(), now);
            let rows: Vec<FlagRow> = registry
                .persisted()
                .iter()
                .map(|(flag, acquired_at)| FlagRow {
                    flag: *flag,
                    acquired_at: *acquired_at,
                    expires_at: registry.expires_at(*flag),
                    active: registry.is_active(*flag, now),
                })
                .collect();
            print_list(&rows, "No protection flags", format)
        }
    }
}
