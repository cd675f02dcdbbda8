// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime change feed
//!
//! Delivery is at-least-once and unordered; consumers filter echoes and stale
//! versions themselves.

mod noop;

pub use noop::NoOpNotifier;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};

use crate::remote::{RemoteChange, RemoteError};
use async_trait::async_trait;
use canvass_core::UserId;
use tokio::sync::mpsc;

/// Stream of row changes for one user; closes when the subscription ends
pub type ChangeStream = mpsc::UnboundedReceiver<RemoteChange>;

/// Adapter for subscribing to row changes
#[async_trait]
pub trait RealtimeNotifier: Clone + Send + Sync + 'static {
    async fn subscribe(&self, user_id: &UserId) -> Result<ChangeStream, RemoteError>;
}
