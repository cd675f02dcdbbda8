// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::notify::FakeNotifier;
use crate::remote::FakeRemoteStore;
use canvass_core::{checksum, DeviceId, Snapshot};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a future on a fresh runtime with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn write(user: &str) -> StateUpsert {
    let snapshot = Snapshot::new();
    StateUpsert {
        user_id: UserId::new(user),
        device_id: DeviceId::new("dev-7"),
        checksum: checksum(&snapshot),
        snapshot,
    }
}

#[test]
fn traced_upsert_logs_span_and_version() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedRemoteStore::new(FakeRemoteStore::new());
        traced.upsert(&write("alice")).await
    });

    assert_eq!(result.unwrap().version, 1);
    assert!(logs.contains("remote.upsert"), "Logs:\n{}", logs);
    assert!(logs.contains("alice"), "Logs:\n{}", logs);
    assert!(logs.contains("dev-7"), "Logs:\n{}", logs);
    assert!(logs.contains("row written"), "Logs:\n{}", logs);
    assert!(logs.contains("elapsed_ms"), "Logs:\n{}", logs);
}

#[test]
fn traced_upsert_logs_failures() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeRemoteStore::new();
        fake.fail_upserts([RemoteError::Unauthorized]);
        TracedRemoteStore::new(fake).upsert(&write("alice")).await
    });

    assert_eq!(result, Err(RemoteError::Unauthorized));
    assert!(logs.contains("upsert failed"), "Logs:\n{}", logs);
    assert!(logs.contains("unauthorized"), "Logs:\n{}", logs);
}

#[test]
fn traced_fetch_reports_missing_row() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedRemoteStore::new(FakeRemoteStore::new());
        traced.fetch(&UserId::new("bob")).await
    });

    assert_eq!(result, Ok(None));
    assert!(logs.contains("remote.fetch"), "Logs:\n{}", logs);
    assert!(logs.contains("no row"), "Logs:\n{}", logs);
}

#[test]
fn traced_subscribe_logs_outcome() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedNotifier::new(FakeNotifier::new());
        traced.subscribe(&UserId::new("carol")).await.map(|_| ())
    });

    assert!(result.is_ok());
    assert!(logs.contains("notify.subscribe"), "Logs:\n{}", logs);
    assert!(logs.contains("carol"), "Logs:\n{}", logs);
    assert!(logs.contains("subscribed"), "Logs:\n{}", logs);
}

#[tokio::test]
async fn traced_store_passes_writes_through() {
    let traced = TracedRemoteStore::new(FakeRemoteStore::new());
    traced.upsert(&write("alice")).await.unwrap();

    assert_eq!(traced.inner().upserts().len(), 1);
}
