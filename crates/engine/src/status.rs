// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Non-blocking sync indicator for the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing waiting to be pushed
    Idle,
    /// A push is in flight
    Syncing,
    /// Mutations queue up until connectivity returns
    Offline,
    /// Pushes are failing or read-back checks disagree; retries continue
    Degraded,
    /// No usable session; sync is a no-op
    Unauthenticated,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Offline => "offline",
            SyncStatus::Degraded => "degraded",
            SyncStatus::Unauthenticated => "unauthenticated",
        };
        f.write_str(s)
    }
}
