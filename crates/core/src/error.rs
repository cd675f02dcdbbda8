// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync error taxonomy
//!
//! Every failure the sync core can report to a caller is a [`SyncError`].
//! How each variant is treated (retried, counted as success, surfaced) is
//! decided in one place, [`crate::retry::RetryPolicy::classify`].

use crate::command::CommandError;
use crate::protection::ProtectionFlag;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    /// The write already landed in the backing store
    #[error("duplicate write")]
    DuplicateWrite,
    #[error("integrity mismatch: expected {expected}, found {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    /// Deliberate deferral while a protection flag is held
    #[error("protection active: {0}")]
    ProtectionActive(ProtectionFlag),
    #[error("retry budget exceeded after {attempts} attempts: {last_error}")]
    RetryBudgetExceeded { attempts: u32, last_error: String },
    #[error("authentication required")]
    AuthRequired,
    #[error("evicted from full offline queue (capacity {capacity})")]
    QueueOverflow { capacity: usize },
    #[error("rejected by remote store: {0}")]
    Rejected(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    /// An optimistic update was never recorded before its fail-fast deadline
    #[error("update was not recorded in time")]
    NotRecorded,
    #[error("invalid command: {0}")]
    Command(#[from] CommandError),
}

impl SyncError {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        SyncError::Cancelled(reason.into())
    }
}
