// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! canvass - offline diagnostics for canvass sync state

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{checksum, config, flags, log, merge, queue};
use output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "canvass",
    version,
    about = "Canvass - inspect and repair local sync state"
)]
struct Cli {
    /// Directory holding the operation log and session state
    #[arg(long, global = true, env = "CANVASS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Sync configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two snapshot files
    Merge(merge::MergeArgs),
    /// Canonical checksum of a snapshot file
    Checksum(checksum::ChecksumArgs),
    /// Operation log diagnostics
    Log(log::LogArgs),
    /// Persisted offline queue
    Queue(queue::QueueArgs),
    /// Persisted protection flags
    Flags(flags::FlagsArgs),
    /// Configuration files
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Merge(args) => merge::handle(args, format),
        Commands::Checksum(args) => checksum::handle(args, format),
        Commands::Config(args) => config::handle(args, format),
        Commands::Log(args) => log::handle(args.command, &state_dir(cli.state_dir)?, format),
        Commands::Queue(args) => queue::handle(args.command, &state_dir(cli.state_dir)?, format),
        Commands::Flags(args) => {
            let sync_config = match &cli.config {
                Some(path) => canvass_core::SyncConfig::load(path)?,
                None => canvass_core::SyncConfig::default(),
            };
            flags::handle(
                args.command,
                &state_dir(cli.state_dir)?,
                &sync_config,
                format,
            )
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CANVASS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn state_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => dirs::data_local_dir()
            .map(|dir| dir.join("canvass"))
            .ok_or_else(|| anyhow::anyhow!("no local data directory; pass --state-dir")),
    }
}
