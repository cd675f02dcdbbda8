// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! canvass-storage: durable local state
//!
//! - [`OperationLog`]: checksummed JSONL log of local operations with an
//!   acknowledgment boundary
//! - [`StateStore`]: atomically replaced JSON files for the visible snapshot,
//!   sync metadata, protection flags and the offline queue

mod entry;
mod oplog;
mod reader;
mod state;

use std::path::PathBuf;
use thiserror::Error;

pub use entry::LogEntry;
pub use oplog::{inspect, read_unsynced, DuplicateOperation, LogMeta, LogStats, OperationLog};
pub use reader::{LogCorruption, LogReadError, LogReader, LogValidation};
pub use state::StateStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("operation log at {path} is locked by another process")]
    Locked {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Read(#[from] LogReadError),
}

/// Write `bytes` to `path` via a synced temporary file and rename
pub(crate) fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> Result<(), StorageError> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
