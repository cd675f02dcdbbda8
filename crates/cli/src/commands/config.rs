// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration commands

use crate::output::{print, OutputFormat};
use canvass_core::SyncConfig;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate a configuration file and print the effective values
    Check {
        /// TOML configuration file
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct CheckedConfig {
    path: PathBuf,
    config: SyncConfig,
}

impl fmt::Display for CheckedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        writeln!(f, "{}: ok", self.path.display())?;
        writeln!(f, "  batch_size: {}", c.batch_size)?;
        writeln!(f, "  queue_capacity: {}", c.queue_capacity)?;
        writeln!(f, "  tick_interval: {:?}", c.tick_interval)?;
        writeln!(
            f,
            "  retry: {} attempts, backoff {:?}..{:?}",
            c.retry.max_attempts, c.retry.base_backoff, c.retry.max_backoff
        )?;
        writeln!(
            f,
            "  overlay: fail fast {:?}, auto confirm {:?}",
            c.overlay.fail_fast, c.overlay.auto_confirm
        )?;
        writeln!(
            f,
            "  integrity: {} mismatches within {:?}",
            c.integrity.mismatch_threshold, c.integrity.window
        )?;
        write!(
            f,
            "  protection: bulk import {:?}, restore {:?}",
            c.protection.bulk_import, c.protection.restore
        )
    }
}

pub fn handle(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Check { file } => {
            let config = SyncConfig::load(&file)?;
            print(&CheckedConfig { path: file, config }, format)
        }
    }
}
