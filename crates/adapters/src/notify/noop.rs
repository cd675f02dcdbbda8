// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op notifier for when realtime delivery is unavailable.

use super::{ChangeStream, RealtimeNotifier};
use crate::remote::RemoteError;
use async_trait::async_trait;
use canvass_core::UserId;
use tokio::sync::mpsc;

/// Notifier whose streams close immediately.
///
/// The engine still converges through bootstrap fetches and the pre-push
/// fetch; it just never hears about peer writes in between.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifier;

impl NoOpNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RealtimeNotifier for NoOpNotifier {
    async fn subscribe(&self, _user_id: &UserId) -> Result<ChangeStream, RemoteError> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(rx)
    }
}
