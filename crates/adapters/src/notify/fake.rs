// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notifier for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ChangeStream, RealtimeNotifier};
use crate::remote::{RemoteChange, RemoteError};
use async_trait::async_trait;
use canvass_core::UserId;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Recorded notifier call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyCall {
    Subscribe { user_id: UserId },
}

#[derive(Default)]
struct FakeNotifierState {
    subscribers: Vec<(UserId, mpsc::UnboundedSender<RemoteChange>)>,
    calls: Vec<NotifyCall>,
    fail_next: Option<RemoteError>,
}

/// Notifier driven by the test: `publish` delivers to every live subscriber
#[derive(Clone, Default)]
pub struct FakeNotifier {
    inner: Arc<Mutex<FakeNotifierState>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    /// Deliver a change to subscribers of its user; returns how many got it
    pub fn publish(&self, change: RemoteChange) -> usize {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state
            .subscribers
            .iter()
            .filter(|(user, _)| *user == change.row.user_id)
            .filter(|(_, tx)| tx.send(change.clone()).is_ok())
            .count()
    }

    /// Close every open stream
    pub fn disconnect(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .clear();
    }

    /// Fail the next subscription attempt
    pub fn fail_next_subscribe(&self, error: RemoteError) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail_next = Some(error);
    }
}

#[async_trait]
impl RealtimeNotifier for FakeNotifier {
    async fn subscribe(&self, user_id: &UserId) -> Result<ChangeStream, RemoteError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(NotifyCall::Subscribe {
            user_id: user_id.clone(),
        });
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push((user_id.clone(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
