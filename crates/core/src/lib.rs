// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! canvass-core: pure domain of the canvass sync engine
//!
//! This crate provides:
//! - The snapshot model and typed commands that mutate it
//! - The state merge engine reconciling two device snapshots
//! - Protection flags, integrity checksums and the retry policy
//! - Pure state machines for the offline queue and the optimistic overlay
//!
//! Nothing in this crate performs I/O; time and ids are injected.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod id;
pub mod integrity;
pub mod merge;
pub mod metadata;
pub mod operation;
pub mod overlay;
pub mod protection;
pub mod queue;
pub mod retry;
pub mod snapshot;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, CommandError, CommandKind, EntityKind, EntityRef};
pub use config::{ConfigError, IntegrityConfig, OverlayConfig, SyncConfig};
pub use error::SyncError;
pub use id::{DeviceId, IdGen, OperationId, SequentialIdGen, UpdateId, UserId, UuidIdGen};
pub use integrity::{checksum, is_echo, Checksum, IntegrityMonitor, Verification};
pub use merge::{guarded_merge, merge, merge_with_report, MergeDecision, MergeOutcome, MergeReport, Side};
pub use metadata::SyncMetadata;
pub use operation::{DedupKey, Operation};
pub use overlay::{Overlay, OverlayEvent, PendingUpdate, UpdateState};
pub use protection::{ProtectionFlag, ProtectionPolicy, ProtectionRegistry};
pub use queue::{OfflineQueue, QueueEffect, QueueEvent, QueuedOperation};
pub use retry::{Disposition, RetryDecision, RetryPolicy};
pub use snapshot::{
    Address, Arrangement, ArrangementStatus, Completion, DaySession, LedgerAction, LedgerEntry,
    Outcome, Snapshot, Timestamp,
};
