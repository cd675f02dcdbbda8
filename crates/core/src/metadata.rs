// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session sync metadata

use crate::id::{DeviceId, UserId};
use crate::integrity::Checksum;
use crate::snapshot::Timestamp;
use serde::{Deserialize, Serialize};

/// What this device knows about the remote row
///
/// Owned by one engine per session and persisted alongside the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub device_id: DeviceId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub last_sync_at: Option<Timestamp>,
    /// Remote row version last seen or written
    #[serde(default)]
    pub version: Option<u64>,
    /// Checksum of the remote row at `version`
    #[serde(default)]
    pub checksum: Option<Checksum>,
    /// Checksum of the last snapshot this device pushed
    #[serde(default)]
    pub last_pushed_checksum: Option<Checksum>,
}

impl SyncMetadata {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            user_id: None,
            last_sync_at: None,
            version: None,
            checksum: None,
            last_pushed_checksum: None,
        }
    }

    pub fn for_user(device_id: DeviceId, user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::new(device_id)
        }
    }

    /// A remote version at or below the one already known carries nothing new
    pub fn is_stale(&self, version: u64) -> bool {
        self.version.is_some_and(|known| version <= known)
    }

    /// Record a successful write of our own snapshot
    pub fn record_push(&mut self, version: u64, checksum: Checksum, at: Timestamp) {
        self.version = Some(self.version.map_or(version, |v| v.max(version)));
        self.last_pushed_checksum = Some(checksum.clone());
        self.checksum = Some(checksum);
        self.last_sync_at = Some(at);
    }

    /// Record a remote row that was read and applied
    pub fn record_pull(&mut self, version: u64, checksum: Checksum, at: Timestamp) {
        self.version = Some(self.version.map_or(version, |v| v.max(version)));
        self.checksum = Some(checksum);
        self.last_sync_at = Some(at);
    }

    /// Forget everything learned from the remote; the device id survives
    pub fn reset(&mut self) {
        *self = Self {
            user_id: self.user_id.clone(),
            ..Self::new(self.device_id.clone())
        };
    }

    /// Sign-out: also unbind the user
    pub fn reset_session(&mut self) {
        *self = Self::new(self.device_id.clone());
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
