// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON state files
//!
//! Small pieces of session state that are rewritten whole: the last visible
//! snapshot, sync metadata, protection flags and the offline queue. Each save
//! goes through a temporary file and a rename, so a crash leaves either the
//! old or the new file.

use crate::{write_atomic, StorageError};
use canvass_core::{OfflineQueue, ProtectionFlag, Snapshot, SyncMetadata, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const SNAPSHOT: &str = "snapshot";
const METADATA: &str = "metadata";
const FLAGS: &str = "flags";
const QUEUE: &str = "queue";

#[derive(Debug, Clone)]
pub struct StateStore {
    base_path: PathBuf,
}

impl StateStore {
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(data)?;
        write_atomic(&self.path_for(name), &json)
    }

    /// Load a value; `None` if it was never saved
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        match std::fs::read_to_string(self.path_for(name)) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}.json"))
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.save(SNAPSHOT, snapshot)
    }

    pub fn load_snapshot(&self) -> Result<Option<Snapshot>, StorageError> {
        self.load(SNAPSHOT)
    }

    pub fn save_metadata(&self, metadata: &SyncMetadata) -> Result<(), StorageError> {
        self.save(METADATA, metadata)
    }

    pub fn load_metadata(&self) -> Result<Option<SyncMetadata>, StorageError> {
        self.load(METADATA)
    }

    pub fn save_flags(&self, flags: &BTreeMap<ProtectionFlag, Timestamp>) -> Result<(), StorageError> {
        self.save(FLAGS, flags)
    }

    pub fn load_flags(&self) -> Result<BTreeMap<ProtectionFlag, Timestamp>, StorageError> {
        Ok(self.load(FLAGS)?.unwrap_or_default())
    }

    pub fn save_queue(&self, queue: &OfflineQueue) -> Result<(), StorageError> {
        self.save(QUEUE, queue)
    }

    pub fn load_queue(&self) -> Result<Option<OfflineQueue>, StorageError> {
        self.load(QUEUE)
    }

    /// Remove everything a signed-out session must not keep
    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.remove(SNAPSHOT)?;
        self.remove(FLAGS)?;
        self.remove(QUEUE)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
