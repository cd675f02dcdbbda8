// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::notify::{ChangeStream, RealtimeNotifier};
use crate::remote::{RemoteError, RemoteStore, StateRow, StateUpsert, UpsertReceipt};
use async_trait::async_trait;
use canvass_core::UserId;

/// Wrapper that adds tracing to any RemoteStore
#[derive(Clone)]
pub struct TracedRemoteStore<R> {
    inner: R,
}

impl<R> TracedRemoteStore<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: RemoteStore> RemoteStore for TracedRemoteStore<R> {
    async fn upsert(&self, row: &StateUpsert) -> Result<UpsertReceipt, RemoteError> {
        let span = tracing::info_span!(
            "remote.upsert",
            user_id = %row.user_id,
            device_id = %row.device_id,
        );
        let _guard = span.enter();

        tracing::info!(
            checksum = %row.checksum,
            list_version = row.snapshot.current_list_version,
            completions = row.snapshot.completions.len(),
            "writing"
        );

        let start = std::time::Instant::now();
        let result = self.inner.upsert(row).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(receipt) => tracing::info!(
                version = receipt.version,
                elapsed_ms = elapsed.as_millis() as u64,
                "row written"
            ),
            Err(e) => tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "upsert failed"
            ),
        }

        result
    }

    async fn fetch(&self, user_id: &UserId) -> Result<Option<StateRow>, RemoteError> {
        let span = tracing::info_span!("remote.fetch", %user_id);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.fetch(user_id).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(Some(row)) => tracing::debug!(
                version = row.version,
                elapsed_ms = elapsed.as_millis() as u64,
                "row fetched"
            ),
            Ok(None) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "no row"),
            Err(e) => tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "fetch failed"
            ),
        }

        result
    }
}

/// Wrapper that adds tracing to any RealtimeNotifier
#[derive(Clone)]
pub struct TracedNotifier<N> {
    inner: N,
}

impl<N> TracedNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<N: RealtimeNotifier> RealtimeNotifier for TracedNotifier<N> {
    async fn subscribe(&self, user_id: &UserId) -> Result<ChangeStream, RemoteError> {
        let span = tracing::info_span!("notify.subscribe", %user_id);
        let _guard = span.enter();

        let result = self.inner.subscribe(user_id).await;
        match &result {
            Ok(_) => tracing::info!("subscribed"),
            Err(e) => tracing::error!(error = %e, "subscribe failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
