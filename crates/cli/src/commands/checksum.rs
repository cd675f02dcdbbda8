// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::{print, read_json, OutputFormat};
use canvass_core::{checksum, Snapshot};
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Args)]
pub struct ChecksumArgs {
    /// Snapshot file
    pub snapshot: PathBuf,
}

#[derive(Serialize)]
struct ChecksumInfo {
    checksum: String,
    addresses: usize,
    completions: usize,
}

impl fmt::Display for ChecksumInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.checksum)
    }
}

pub fn handle(args: ChecksumArgs, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot: Snapshot = read_json(&args.snapshot)?;
    let info = ChecksumInfo {
        checksum: checksum(&snapshot).to_string(),
        addresses: snapshot.addresses.len(),
        completions: snapshot.completions.len(),
    };
    print(&info, format)
}
