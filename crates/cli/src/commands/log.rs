// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation log diagnostics

use crate::output::{or_dash, print, print_list, OutputFormat};
use canvass_core::{Operation, Timestamp};
use canvass_storage::{inspect, read_unsynced, LogStats, OperationLog};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Args)]
pub struct LogArgs {
    #[command(subcommand)]
    pub command: LogCommand,
}

#[derive(Subcommand)]
pub enum LogCommand {
    /// Counts, sequence range and acknowledgment boundary
    Stats,
    /// Entries not yet acknowledged by the backing store
    Unsynced,
    /// Truncate a corrupt tail left by an interrupted write
    Repair,
}

#[derive(Serialize)]
#[serde(transparent)]
struct StatsView(LogStats);

impl fmt::Display for StatsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        writeln!(f, "entries:        {}", s.total)?;
        writeln!(f, "unsynced:       {}", s.unsynced)?;
        let range = match (s.first_sequence, s.last_sequence) {
            (Some(first), Some(last)) => format!("{}..={}", first, last),
            _ => "-".to_string(),
        };
        writeln!(f, "sequences:      {}", range)?;
        writeln!(f, "next sequence:  {}", s.next_sequence)?;
        writeln!(f, "acked through:  {}", or_dash(s.acked_through.map(format_time)))?;
        writeln!(f, "acked sequence: {}", or_dash(s.acked_sequence))?;
        for (kind, count) in &s.by_type {
            writeln!(f, "  {:<20} {}", kind, count)?;
        }
        for dup in &s.duplicates {
            writeln!(
                f,
                "duplicate: {} (sequence {}) repeats {}",
                dup.id, dup.sequence, dup.duplicate_of
            )?;
        }
        match s.corrupt_line {
            Some(line) => write!(f, "corrupt at line {}; run `canvass log repair`", line),
            None => write!(f, "log is intact"),
        }
    }
}

#[derive(Serialize)]
struct OperationRow {
    sequence: u64,
    id: String,
    #[serde(rename = "type")]
    kind: String,
    timestamp: Timestamp,
}

impl From<Operation> for OperationRow {
    fn from(op: Operation) -> Self {
        Self {
            sequence: op.sequence,
            id: op.id.to_string(),
            kind: op.kind.to_string(),
            timestamp: op.timestamp,
        }
    }
}

impl fmt::Display for OperationRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  {:<24} {:<18} {}",
            self.sequence,
            self.id,
            self.kind,
            format_time(self.timestamp)
        )
    }
}

#[derive(Serialize)]
struct RepairResult {
    bytes_removed: u64,
}

impl fmt::Display for RepairResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes_removed == 0 {
            write!(f, "Nothing to repair")
        } else {
            write!(f, "Removed {} bytes of corrupt tail", self.bytes_removed)
        }
    }
}

pub fn handle(command: LogCommand, dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        LogCommand::Stats => print(&StatsView(inspect(dir)?), format),
        LogCommand::Unsynced => {
            let rows: Vec<OperationRow> =
                read_unsynced(dir)?.into_iter().map(OperationRow::from).collect();
            print_list(&rows, "No unsynced operations", format)
        }
        LogCommand::Repair => {
            let bytes_removed = OperationLog::repair(dir)?;
            print(&RepairResult { bytes_removed }, format)
        }
    }
}

pub(crate) fn format_time(at: Timestamp) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
