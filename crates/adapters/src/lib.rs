// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Contracts with the outside world: the shared backing store, its realtime
//! change feed and the identity provider

pub mod identity;
pub mod notify;
pub mod remote;
pub mod traced;

pub use identity::{IdentityProvider, Session, StaticIdentity};
pub use notify::{ChangeStream, NoOpNotifier, RealtimeNotifier};
pub use remote::{RemoteChange, RemoteError, RemoteStore, StateRow, StateUpsert, UpsertReceipt};
pub use traced::{TracedNotifier, TracedRemoteStore};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use identity::FakeIdentity;
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use remote::{FakeRemoteStore, RemoteCall};
