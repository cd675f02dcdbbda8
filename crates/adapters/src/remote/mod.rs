// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared backing store
//!
//! One row per user holds the full snapshot together with a version the store
//! increments on every write, a server timestamp and the checksum of the
//! payload as written. The store performs no merging: the last upsert wins and
//! clients reconcile before they write.

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemoteStore, RemoteCall};

use async_trait::async_trait;
use canvass_core::{Checksum, DeviceId, Snapshot, SyncError, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the backing store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transient: {0}")]
    Transient(String),
    /// The write already landed
    #[error("duplicate write")]
    Duplicate,
    #[error("unauthorized")]
    Unauthorized,
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transient(msg) => SyncError::TransientNetwork(msg),
            RemoteError::Duplicate => SyncError::DuplicateWrite,
            RemoteError::Unauthorized => SyncError::AuthRequired,
            RemoteError::Rejected(msg) => SyncError::Rejected(msg),
        }
    }
}

/// The stored row for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRow {
    pub user_id: UserId,
    pub snapshot: Snapshot,
    pub version: u64,
    pub updated_at: Timestamp,
    pub checksum: Checksum,
}

/// A full-snapshot write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpsert {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub snapshot: Snapshot,
    pub checksum: Checksum,
}

/// What the store reports after accepting a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReceipt {
    pub version: u64,
    pub updated_at: Timestamp,
    pub checksum: Checksum,
}

/// A row-changed notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChange {
    pub row: StateRow,
    /// Device that performed the write, when the transport knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_device_id: Option<DeviceId>,
}

/// Adapter for the shared per-user state row
#[async_trait]
pub trait RemoteStore: Clone + Send + Sync + 'static {
    /// Replace the user's row, returning the new version
    async fn upsert(&self, row: &StateUpsert) -> Result<UpsertReceipt, RemoteError>;

    /// Read the user's row; `None` if the user never synced
    async fn fetch(&self, user_id: &UserId) -> Result<Option<StateRow>, RemoteError>;
}
