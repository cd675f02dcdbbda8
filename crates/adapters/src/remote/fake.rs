// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake backing store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{RemoteError, RemoteStore, StateRow, StateUpsert, UpsertReceipt};
use async_trait::async_trait;
use canvass_core::{checksum, Address, DeviceId, Snapshot, Timestamp, UserId};
use chrono::DateTime;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Seconds since the epoch of the first version's `updated_at`
const EPOCH_BASE: i64 = 1_700_000_000;

/// Recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Upsert {
        user_id: UserId,
        device_id: DeviceId,
        snapshot: Snapshot,
    },
    Fetch {
        user_id: UserId,
    },
}

#[derive(Default)]
struct FakeRemoteState {
    rows: HashMap<UserId, StateRow>,
    calls: Vec<RemoteCall>,
    upsert_failures: VecDeque<RemoteError>,
    fetch_failures: VecDeque<RemoteError>,
    corrupt_reads: usize,
}

/// In-memory backing store that versions writes like the real one
#[derive(Clone, Default)]
pub struct FakeRemoteStore {
    inner: Arc<Mutex<FakeRemoteState>>,
}

impl FakeRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeRemoteState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Snapshots written so far, oldest first
    pub fn upserts(&self) -> Vec<Snapshot> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Upsert { snapshot, .. } => Some(snapshot.clone()),
                RemoteCall::Fetch { .. } => None,
            })
            .collect()
    }

    pub fn row(&self, user_id: &UserId) -> Option<StateRow> {
        self.state().rows.get(user_id).cloned()
    }

    /// Simulate a write from another device; returns the stored row
    pub fn put(&self, user_id: &UserId, snapshot: Snapshot) -> StateRow {
        let mut state = self.state();
        let version = state.rows.get(user_id).map_or(1, |row| row.version + 1);
        let row = StateRow {
            user_id: user_id.clone(),
            checksum: checksum(&snapshot),
            snapshot,
            version,
            updated_at: version_timestamp(version),
        };
        state.rows.insert(user_id.clone(), row.clone());
        row
    }

    /// Fail the next upserts with these errors, in order
    pub fn fail_upserts(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state().upsert_failures.extend(errors);
    }

    /// Fail the next fetches with these errors, in order
    pub fn fail_fetches(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state().fetch_failures.extend(errors);
    }

    /// Make the next `count` fetches return a payload that no longer matches
    /// what was written
    pub fn corrupt_reads(&self, count: usize) {
        self.state().corrupt_reads += count;
    }
}

fn version_timestamp(version: u64) -> Timestamp {
    DateTime::from_timestamp(EPOCH_BASE + version as i64, 0).unwrap_or_default()
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn upsert(&self, row: &StateUpsert) -> Result<UpsertReceipt, RemoteError> {
        let mut state = self.state();
        state.calls.push(RemoteCall::Upsert {
            user_id: row.user_id.clone(),
            device_id: row.device_id.clone(),
            snapshot: row.snapshot.clone(),
        });
        if let Some(err) = state.upsert_failures.pop_front() {
            return Err(err);
        }

        let version = state
            .rows
            .get(&row.user_id)
            .map_or(1, |stored| stored.version + 1);
        let stored = StateRow {
            user_id: row.user_id.clone(),
            snapshot: row.snapshot.clone(),
            version,
            updated_at: version_timestamp(version),
            checksum: checksum(&row.snapshot),
        };
        let receipt = UpsertReceipt {
            version,
            updated_at: stored.updated_at,
            checksum: stored.checksum.clone(),
        };
        state.rows.insert(row.user_id.clone(), stored);
        Ok(receipt)
    }

    async fn fetch(&self, user_id: &UserId) -> Result<Option<StateRow>, RemoteError> {
        let mut state = self.state();
        state.calls.push(RemoteCall::Fetch {
            user_id: user_id.clone(),
        });
        if let Some(err) = state.fetch_failures.pop_front() {
            return Err(err);
        }

        let mut row = state.rows.get(user_id).cloned();
        if state.corrupt_reads > 0 {
            if let Some(row) = row.as_mut() {
                state.corrupt_reads -= 1;
                row.snapshot.addresses.push(Address::new("<corrupted>"));
            }
        }
        Ok(row)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
