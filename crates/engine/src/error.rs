// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync engine

use canvass_core::{ConfigError, SyncError};
use canvass_storage::StorageError;
use thiserror::Error;

/// Errors returned to callers of the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("not signed in")]
    SignedOut,
    /// The identity provider reports a different session than the engine owns
    #[error("session changed")]
    SessionChanged,
    #[error("engine stopped")]
    Stopped,
}
