// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable operation log
//!
//! Layout inside the log directory:
//!
//! ```text
//! oplog.jsonl       one LogEntry per line, fsync'd after every append
//! oplog.meta.json   acknowledgment boundary + next sequence, replaced atomically
//! oplog.lock        exclusive advisory lock held while the log is open
//! ```
//!
//! The acknowledgment boundary is a timestamp. The acknowledged part of the
//! log is the longest prefix whose entries are all at or before it, so an
//! entry written with a skewed clock can never be skipped over.

use crate::entry::LogEntry;
use crate::reader::{LogCorruption, LogReader};
use crate::{write_atomic, StorageError};
use canvass_core::{Command, CommandKind, DeviceId, Operation, OperationId, Timestamp};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "oplog.jsonl";
const META_FILE: &str = "oplog.meta.json";
const LOCK_FILE: &str = "oplog.lock";

/// Sidecar state of the log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMeta {
    #[serde(default)]
    pub acked_through: Option<Timestamp>,
    /// Survives `clear` so sequences are never reused
    #[serde(default)]
    pub next_sequence: u64,
}

impl LogMeta {
    fn load(path: &Path) -> Result<Self, StorageError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// An entry whose `(type, payload)` repeats an earlier entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateOperation {
    pub id: OperationId,
    pub sequence: u64,
    pub duplicate_of: OperationId,
}

/// Diagnostics over the whole log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStats {
    pub total: usize,
    pub unsynced: usize,
    pub by_type: BTreeMap<CommandKind, usize>,
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
    pub acked_through: Option<Timestamp>,
    pub acked_sequence: Option<u64>,
    pub next_sequence: u64,
    pub duplicates: Vec<DuplicateOperation>,
    pub corrupt_line: Option<u64>,
}

/// Append-only, per-device sequenced operation log
pub struct OperationLog {
    dir: PathBuf,
    file: File,
    meta: LogMeta,
    device_id: DeviceId,
    // Held for the lifetime of the log; dropping it releases the lock
    _lock: File,
}

impl OperationLog {
    /// Open or create the log in `dir`, taking the exclusive lock.
    ///
    /// A corrupt tail left by a crash is truncated before appending resumes.
    pub fn open(dir: &Path, device_id: DeviceId) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let lock = acquire_lock(dir)?;

        let log_path = dir.join(LOG_FILE);
        let removed = truncate_corrupt_tail(&log_path)?;
        if removed > 0 {
            tracing::warn!(bytes = removed, path = %log_path.display(), "truncated corrupt operation log tail");
        }

        let mut meta = LogMeta::load(&dir.join(META_FILE))?;
        if let Some(last) = LogReader::new(&log_path)
            .valid_entries()?
            .last()
            .map(LogEntry::sequence)
        {
            meta.next_sequence = meta.next_sequence.max(last + 1);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            meta,
            device_id,
            _lock: lock,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn next_sequence(&self) -> u64 {
        self.meta.next_sequence
    }

    pub fn acked_through(&self) -> Option<Timestamp> {
        self.meta.acked_through
    }

    /// Append a command, returning the durable operation
    pub fn append(
        &mut self,
        id: OperationId,
        command: Command,
        timestamp: Timestamp,
    ) -> Result<Operation, StorageError> {
        let sequence = self.meta.next_sequence;
        let operation = Operation::new(id, sequence, command, self.device_id.clone(), timestamp);
        let line = LogEntry::new(operation.clone()).to_line()?;

        // The sequence is claimed durably before the entry that uses it, so a
        // crash can skip a number but never hand it out twice
        self.meta.next_sequence = sequence + 1;
        self.save_meta()?;

        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.sync_all()?;

        tracing::debug!(sequence, kind = %operation.kind, "operation appended");
        Ok(operation)
    }

    /// Every valid entry, in sequence order
    pub fn entries(&self) -> Result<Vec<Operation>, StorageError> {
        Ok(LogReader::new(&self.path())
            .valid_entries()?
            .into_iter()
            .map(|e| e.operation)
            .collect())
    }

    /// Entries after the acknowledged prefix
    pub fn get_unsynced(&self) -> Result<Vec<Operation>, StorageError> {
        let entries = self.entries()?;
        let acked = acked_prefix_len(&entries, self.meta.acked_through);
        Ok(entries.into_iter().skip(acked).collect())
    }

    /// Advance the boundary; earlier timestamps are ignored
    pub fn mark_synced_up_to(&mut self, timestamp: Timestamp) -> Result<bool, StorageError> {
        if self.meta.acked_through.is_some_and(|current| timestamp <= current) {
            return Ok(false);
        }
        self.meta.acked_through = Some(timestamp);
        self.save_meta()?;
        Ok(true)
    }

    /// Forget the acknowledgment boundary without touching entries
    pub fn reset_acknowledgments(&mut self) -> Result<(), StorageError> {
        self.meta.acked_through = None;
        self.save_meta()
    }

    /// Wipe all entries and the boundary; sequence numbering continues
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.meta.acked_through = None;
        self.save_meta()?;
        self.file.set_len(0)?;
        self.file.sync_all()?;
        tracing::info!(next_sequence = self.meta.next_sequence, "operation log cleared");
        Ok(())
    }

    pub fn stats(&self) -> Result<LogStats, StorageError> {
        inspect(&self.dir)
    }

    /// Truncate a corrupt tail; returns the number of bytes removed
    pub fn repair(dir: &Path) -> Result<u64, StorageError> {
        let _lock = acquire_lock(dir)?;
        let removed = truncate_corrupt_tail(&dir.join(LOG_FILE))?;
        if removed > 0 {
            tracing::info!(bytes = removed, "operation log repaired");
        }
        Ok(removed)
    }

    fn save_meta(&self) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(&self.meta)?;
        write_atomic(&self.dir.join(META_FILE), &json)
    }
}

/// Read-only diagnostics; does not take the lock
pub fn inspect(dir: &Path) -> Result<LogStats, StorageError> {
    let meta = LogMeta::load(&dir.join(META_FILE))?;
    let validation = LogReader::new(&dir.join(LOG_FILE)).validate()?;
    let entries: Vec<Operation> = validation
        .entries
        .into_iter()
        .map(|e| e.operation)
        .collect();

    let acked = acked_prefix_len(&entries, meta.acked_through);
    let mut by_type = BTreeMap::new();
    for op in &entries {
        *by_type.entry(op.kind).or_insert(0) += 1;
    }

    Ok(LogStats {
        total: entries.len(),
        unsynced: entries.len() - acked,
        by_type,
        first_sequence: entries.first().map(|op| op.sequence),
        last_sequence: entries.last().map(|op| op.sequence),
        acked_through: meta.acked_through,
        acked_sequence: acked.checked_sub(1).map(|i| entries[i].sequence),
        next_sequence: meta
            .next_sequence
            .max(entries.last().map_or(0, |op| op.sequence + 1)),
        duplicates: find_duplicates(&entries),
        corrupt_line: validation.corruption.map(|c: LogCorruption| c.line),
    })
}

/// Read-only view of unsynced entries; does not take the lock
pub fn read_unsynced(dir: &Path) -> Result<Vec<Operation>, StorageError> {
    let meta = LogMeta::load(&dir.join(META_FILE))?;
    let entries: Vec<Operation> = LogReader::new(&dir.join(LOG_FILE))
        .valid_entries()?
        .into_iter()
        .map(|e| e.operation)
        .collect();
    let acked = acked_prefix_len(&entries, meta.acked_through);
    Ok(entries.into_iter().skip(acked).collect())
}

fn acked_prefix_len(entries: &[Operation], boundary: Option<Timestamp>) -> usize {
    match boundary {
        Some(boundary) => entries
            .iter()
            .take_while(|op| op.timestamp <= boundary)
            .count(),
        None => 0,
    }
}

fn find_duplicates(entries: &[Operation]) -> Vec<DuplicateOperation> {
    let mut seen: HashMap<(CommandKind, String), &OperationId> = HashMap::new();
    let mut duplicates = Vec::new();
    for op in entries {
        let payload = serde_json::to_string(&op.payload).unwrap_or_default();
        match seen.get(&(op.kind, payload.clone())) {
            Some(original) => duplicates.push(DuplicateOperation {
                id: op.id.clone(),
                sequence: op.sequence,
                duplicate_of: (*original).clone(),
            }),
            None => {
                seen.insert((op.kind, payload), &op.id);
            }
        }
    }
    duplicates
}

fn acquire_lock(dir: &Path) -> Result<File, StorageError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOCK_FILE);
    let file = File::create(&path)?;
    file.try_lock_exclusive()
        .map_err(|source| StorageError::Locked { path, source })?;
    Ok(file)
}

fn truncate_corrupt_tail(log_path: &Path) -> Result<u64, StorageError> {
    let validation = LogReader::new(log_path).validate()?;
    let Some(corruption) = validation.corruption else {
        return Ok(0);
    };

    let file = OpenOptions::new().write(true).open(log_path)?;
    let len = file.metadata()?.len();
    file.set_len(validation.valid_len)?;
    file.sync_all()?;

    tracing::warn!(line = corruption.line, reason = %corruption.reason, "operation log corruption");
    Ok(len.saturating_sub(validation.valid_len))
}

#[cfg(test)]
#[path = "oplog_tests.rs"]
mod tests;
