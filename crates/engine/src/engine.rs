// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One sync session
//!
//! Every public method takes `&mut self` and runs to completion before the
//! next one starts; the driver in [`crate::driver`] guarantees that when the
//! engine runs as a task. Network calls are the only suspension points, and
//! after each one the identity provider is asked whether the session is still
//! the one the call was made for.

use crate::error::EngineError;
use crate::status::SyncStatus;
use canvass_adapters::{IdentityProvider, RemoteChange, RemoteStore, Session, StateRow, StateUpsert};
use canvass_core::clock::add_duration;
use canvass_core::{
    checksum, is_echo, Checksum, Clock, Command, DeviceId, Disposition, IdGen, IntegrityMonitor,
    OfflineQueue, OperationId, Overlay, OverlayEvent, ProtectionFlag, ProtectionRegistry,
    QueueEffect, QueueEvent, RetryPolicy, Snapshot, SyncConfig, SyncError, SyncMetadata,
    Timestamp, UpdateId, Verification,
};
use canvass_storage::{OperationLog, StateStore};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{oneshot, watch};

type TicketResult = Result<(), SyncError>;

/// The eventual outcome of one local mutation
#[derive(Debug)]
pub struct MutationTicket {
    pub id: OperationId,
    outcome: oneshot::Receiver<TicketResult>,
}

impl MutationTicket {
    /// Wait until the operation reached the backing store or was rejected
    pub async fn outcome(self) -> TicketResult {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(SyncError::cancelled("engine stopped")))
    }

    /// `None` while the operation is still in flight
    pub fn try_outcome(&mut self) -> Option<TicketResult> {
        match self.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(SyncError::cancelled("engine stopped")))
            }
        }
    }
}

/// Sync state of one signed-in session
pub struct SyncEngine<R, I, C, G> {
    remote: R,
    identity: I,
    clock: C,
    ids: G,
    config: SyncConfig,
    session: Session,
    device_id: DeviceId,
    signed_out: bool,
    online: bool,
    overlay: Overlay,
    log: OperationLog,
    store: StateStore,
    queue: OfflineQueue,
    registry: ProtectionRegistry,
    integrity: IntegrityMonitor,
    metadata: SyncMetadata,
    waiters: HashMap<OperationId, oneshot::Sender<TicketResult>>,
    /// Latest remote row that arrived while protected
    deferred: Option<StateRow>,
    /// The visible snapshot differs from the remote row
    needs_push: bool,
    push_not_before: Option<Timestamp>,
    /// Consecutive failed re-pushes, for backoff
    push_attempts: u32,
    resync_requested: bool,
    snapshots: watch::Sender<Snapshot>,
    status: watch::Sender<SyncStatus>,
}

impl<R, I, C, G> SyncEngine<R, I, C, G>
where
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock,
    G: IdGen,
{
    /// Open the session's local state under `dir`
    ///
    /// State left behind by a different user is discarded. When no offline
    /// queue was persisted, unacknowledged log entries are queued again.
    pub fn open(
        dir: &Path,
        config: SyncConfig,
        remote: R,
        identity: I,
        clock: C,
        ids: G,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let session = identity.session().ok_or(EngineError::SignedOut)?;
        let device_id = identity.device_id();
        let now = clock.now();

        let store = StateStore::open(dir)?;
        let mut log = OperationLog::open(dir, device_id.clone())?;

        let persisted = store.load_metadata()?;
        let same_user = persisted.as_ref().is_some_and(|meta| {
            meta.device_id == device_id && meta.user_id.as_ref() == Some(&session.user_id)
        });
        let metadata = match persisted {
            Some(meta) if same_user => meta,
            _ => {
                tracing::info!(user_id = %session.user_id, %device_id, "starting fresh session state");
                store.clear_session()?;
                log.clear()?;
                let meta = SyncMetadata::for_user(device_id.clone(), session.user_id.clone());
                store.save_metadata(&meta)?;
                meta
            }
        };

        let registry =
            ProtectionRegistry::from_persisted(store.load_flags()?, config.protection.clone(), now);
        let snapshot = store.load_snapshot()?.unwrap_or_default();

        let queue = match store.load_queue()? {
            Some(queue) => {
                let (queue, evicted) =
                    queue.with_limits(config.queue_capacity, config.retry.clone());
                for item in evicted {
                    tracing::warn!(id = %item.id(), "persisted operation evicted by smaller capacity");
                }
                queue
            }
            None => {
                let mut queue = OfflineQueue::new(config.queue_capacity, config.retry.clone());
                for operation in log.get_unsynced()? {
                    tracing::info!(id = %operation.id, sequence = operation.sequence, "requeueing unsynced operation");
                    queue = queue.transition(QueueEvent::Enqueue { operation }, &clock).0;
                }
                queue
            }
        };

        let (snapshots, _) = watch::channel(snapshot.clone());
        let (status, _) = watch::channel(SyncStatus::Idle);

        Ok(Self {
            overlay: Overlay::new(snapshot, config.overlay.clone()),
            integrity: config.integrity.monitor(),
            remote,
            identity,
            clock,
            ids,
            config,
            session,
            device_id,
            signed_out: false,
            online: true,
            log,
            store,
            queue,
            registry,
            metadata,
            waiters: HashMap::new(),
            deferred: None,
            needs_push: false,
            push_not_before: None,
            push_attempts: 0,
            resync_requested: false,
            snapshots,
            status,
        })
    }

    pub fn visible(&self) -> &Snapshot {
        self.overlay.visible()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metadata(&self) -> &SyncMetadata {
        &self.metadata
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn registry(&self) -> &ProtectionRegistry {
        &self.registry
    }

    pub fn integrity(&self) -> &IntegrityMonitor {
        &self.integrity
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Visible snapshots, starting with the current one
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Apply a local mutation
    ///
    /// The result is visible immediately. The returned ticket resolves once
    /// the operation reached the backing store, or with the reason it never
    /// will.
    pub async fn mutate(&mut self, command: Command) -> Result<MutationTicket, EngineError> {
        self.ensure_signed_in()?;
        let now = self.clock.now();
        let id = self.ids.next();
        let update_id = UpdateId::new(id.clone());
        let operation_id = OperationId::new(id);
        let protection = command.protection();

        self.overlay.apply(update_id.clone(), command.clone(), now)?;

        let operation = match self.log.append(operation_id.clone(), command, now) {
            Ok(operation) => operation,
            Err(err) => {
                let events = self.overlay.fail(&update_id, SyncError::NotRecorded);
                self.handle_overlay_events(events);
                self.publish();
                return Err(err.into());
            }
        };
        self.overlay.acknowledge(&update_id);
        tracing::debug!(
            id = %operation.id,
            sequence = operation.sequence,
            kind = %operation.kind,
            "mutation recorded"
        );
        if let Some(flag) = protection {
            self.registry.acquire(flag, now);
        }
        self.release_finished_timing();
        self.apply_deferred(now);

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(operation_id.clone(), tx);
        self.queue_transition(QueueEvent::Enqueue { operation })?;
        self.persist()?;
        self.publish();

        if let Err(err) = self.drain().await {
            tracing::warn!(error = %err, "drain after mutation failed");
        }

        Ok(MutationTicket {
            id: operation_id,
            outcome: rx,
        })
    }

    /// Push queued operations while online and unprotected
    pub async fn drain(&mut self) -> Result<(), EngineError> {
        loop {
            if self.signed_out {
                return Ok(());
            }
            if !self.online {
                self.set_status(SyncStatus::Offline);
                return Ok(());
            }
            if !self.session_live() {
                self.set_status(SyncStatus::Unauthenticated);
                return Ok(());
            }
            if self.resync_requested {
                self.resync_requested = false;
                self.resync().await?;
                continue;
            }

            let now = self.clock.now();
            if let Some(flag) = self.push_veto(now) {
                tracing::debug!(%flag, queued = self.queue.len(), "push deferred while protected");
                self.settle_status();
                return Ok(());
            }

            let batch = self.queue.next_batch(self.config.batch_size, now);
            if batch.is_empty() {
                let backing_off = self.push_not_before.is_some_and(|at| at > now);
                if !self.needs_push || backing_off {
                    self.settle_status();
                    return Ok(());
                }
                self.set_status(SyncStatus::Syncing);
                let result = self.push().await;
                if !self.session_live() {
                    tracing::info!("session changed during re-push, discarding result");
                    self.set_status(SyncStatus::Unauthenticated);
                    return Ok(());
                }
                match result {
                    Ok(()) => {
                        self.needs_push = false;
                        self.push_not_before = None;
                        self.push_attempts = 0;
                        self.persist()?;
                        continue;
                    }
                    Err(err) => {
                        if !matches!(RetryPolicy::classify(&err), Disposition::Defer) {
                            self.push_attempts = self.push_attempts.saturating_add(1);
                            let after = self.config.retry.backoff(self.push_attempts);
                            tracing::warn!(
                                error = %err,
                                attempts = self.push_attempts,
                                ?after,
                                "re-push failed"
                            );
                            self.push_not_before = Some(add_duration(now, after));
                        }
                        self.persist()?;
                        self.status_after_failure(&err);
                        return Ok(());
                    }
                }
            }

            let ids: Vec<OperationId> = batch.iter().map(|op| op.id.clone()).collect();
            self.set_status(SyncStatus::Syncing);
            let result = self.push().await;
            if !self.session_live() {
                tracing::info!(batch = ids.len(), "session changed during push, discarding result");
                self.set_status(SyncStatus::Unauthenticated);
                return Ok(());
            }

            match result {
                Ok(()) => {
                    self.needs_push = false;
                    self.push_not_before = None;
                    self.push_attempts = 0;
                    tracing::info!(
                        batch = ids.len(),
                        version = self.metadata.version,
                        "batch pushed"
                    );
                    self.queue_transition(QueueEvent::BatchSucceeded { ids })?;
                    self.persist()?;
                    self.publish();
                }
                Err(error) => {
                    let disposition = RetryPolicy::classify(&error);
                    self.queue_transition(QueueEvent::BatchFailed {
                        ids,
                        error: error.clone(),
                    })?;
                    self.persist()?;
                    self.publish();
                    match disposition {
                        Disposition::Succeeded | Disposition::Terminal => continue,
                        Disposition::Retry | Disposition::Defer => {
                            self.status_after_failure(&error);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Apply a notification from the realtime feed
    pub async fn handle_remote_change(&mut self, change: RemoteChange) -> Result<(), EngineError> {
        if self.signed_out {
            return Ok(());
        }
        let row = change.row;
        if row.user_id != self.session.user_id {
            tracing::debug!(user_id = %row.user_id, "change for another user ignored");
            return Ok(());
        }
        if change.origin_device_id.as_ref() == Some(&self.device_id) {
            tracing::debug!(version = row.version, "own write echoed back");
            return Ok(());
        }
        let incoming = checksum(&row.snapshot);
        if is_echo(&incoming, self.metadata.last_pushed_checksum.as_ref()) {
            tracing::debug!(version = row.version, "echo of last push ignored");
            return Ok(());
        }
        if self.metadata.is_stale(row.version) {
            tracing::debug!(version = row.version, known = ?self.metadata.version, "stale change ignored");
            return Ok(());
        }

        let now = self.clock.now();
        if let Some(flag) = self.registry.active_flag(now) {
            self.defer(row, flag);
            return Ok(());
        }

        self.merge_remote(&row);
        self.persist()?;
        self.publish();
        self.drain().await
    }

    /// Advance timers: overlay deadlines, flag expiry, deferred rows, backoff
    pub async fn tick(&mut self) -> Result<(), EngineError> {
        if self.signed_out {
            return Ok(());
        }
        let now = self.clock.now();

        let events = self.overlay.tick(now);
        let mut changed = !events.is_empty();
        self.handle_overlay_events(events);

        let expired = self.registry.prune(now);
        for flag in &expired {
            tracing::debug!(%flag, "protection expired");
        }
        changed |= !expired.is_empty();
        changed |= self.apply_deferred(now);

        if changed {
            self.persist()?;
            self.publish();
        }
        self.drain().await
    }

    pub async fn set_online(&mut self, online: bool) -> Result<(), EngineError> {
        if self.online != online {
            tracing::info!(online, queued = self.queue.len(), "connectivity changed");
        }
        self.online = online;
        if online {
            self.drain().await
        } else {
            self.set_status(SyncStatus::Offline);
            Ok(())
        }
    }

    /// Veto remote snapshots and pushes while sensitive local work runs
    pub fn protect(&mut self, flag: ProtectionFlag) -> Result<(), EngineError> {
        self.ensure_signed_in()?;
        self.registry.acquire(flag, self.clock.now());
        self.store.save_flags(self.registry.persisted())?;
        Ok(())
    }

    pub async fn release(&mut self, flag: ProtectionFlag) -> Result<(), EngineError> {
        self.ensure_signed_in()?;
        self.registry.clear(flag);
        self.apply_deferred(self.clock.now());
        self.persist()?;
        self.publish();
        self.drain().await
    }

    /// Initial fetch and merge of the remote row
    pub async fn bootstrap(&mut self) -> Result<(), EngineError> {
        self.ensure_signed_in()?;
        self.fetch_and_merge().await?;
        self.drain().await
    }

    /// Forget what is known about the remote row and reconcile from scratch
    pub async fn force_resync(&mut self) -> Result<(), EngineError> {
        self.ensure_signed_in()?;
        self.resync().await?;
        self.drain().await
    }

    /// End the session: reject every waiting caller and drop session state
    ///
    /// The operation log keeps its entries but loses its acknowledgment
    /// boundary; the device id survives.
    pub fn sign_out(&mut self) -> Result<(), EngineError> {
        if self.signed_out {
            return Ok(());
        }
        tracing::info!(
            user_id = %self.session.user_id,
            queued = self.queue.len(),
            waiting = self.waiters.len(),
            "signing out"
        );

        let events = self.overlay.cancel_all("signed out");
        self.handle_overlay_events(events);
        self.queue_transition(QueueEvent::Clear {
            reason: "signed out".to_string(),
        })?;
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.send(Err(SyncError::cancelled("signed out")));
        }

        self.overlay.reset(Snapshot::new());
        self.registry.clear_all();
        self.integrity.reset();
        self.metadata.reset_session();
        self.deferred = None;
        self.needs_push = false;
        self.push_not_before = None;
        self.push_attempts = 0;
        self.resync_requested = false;

        self.log.reset_acknowledgments()?;
        self.store.clear_session()?;
        self.store.save_metadata(&self.metadata)?;

        self.signed_out = true;
        self.publish();
        self.set_status(SyncStatus::Unauthenticated);
        Ok(())
    }

    /// Pre-push fetch, merge if the remote moved, upsert, read-back check
    async fn push(&mut self) -> Result<(), SyncError> {
        let user_id = self.session.user_id.clone();

        let fetched = self.remote.fetch(&user_id).await?;
        if !self.session_live() {
            return Err(SyncError::cancelled("session changed"));
        }
        if let Some(row) = fetched {
            if !self.metadata.is_stale(row.version) {
                if let Some(flag) = self.registry.active_flag(self.clock.now()) {
                    self.defer(row, flag);
                    return Err(SyncError::ProtectionActive(flag));
                }
                tracing::info!(
                    version = row.version,
                    known = ?self.metadata.version,
                    "remote moved, merging before push"
                );
                self.merge_remote(&row);
                self.publish();
            }
        }

        let snapshot = self.overlay.visible().clone();
        let expected = checksum(&snapshot);
        let receipt = self
            .remote
            .upsert(&StateUpsert {
                user_id: user_id.clone(),
                device_id: self.device_id.clone(),
                snapshot,
                checksum: expected.clone(),
            })
            .await?;
        if !self.session_live() {
            return Err(SyncError::cancelled("session changed"));
        }
        self.metadata
            .record_push(receipt.version, expected.clone(), self.clock.now());

        match self.remote.fetch(&user_id).await {
            Ok(Some(row)) if row.version == receipt.version => {
                self.verify(&expected, &checksum(&row.snapshot));
            }
            Ok(Some(row)) => {
                tracing::debug!(
                    written = receipt.version,
                    found = row.version,
                    "row moved on before read-back"
                );
            }
            Ok(None) => self.verify(&expected, &Checksum("missing".to_string())),
            Err(err) => tracing::warn!(error = %err, "read-back failed, verification skipped"),
        }
        Ok(())
    }

    fn verify(&mut self, expected: &Checksum, actual: &Checksum) {
        match self.integrity.record(expected, actual, self.clock.now()) {
            Verification::Match | Verification::SoftMismatch { .. } => {}
            Verification::Escalate { .. } => self.resync_requested = true,
        }
    }

    async fn resync(&mut self) -> Result<(), EngineError> {
        tracing::info!(user_id = %self.session.user_id, "full resync");
        self.metadata.reset();
        self.integrity.reset();
        self.fetch_and_merge().await
    }

    /// Remote errors are absorbed here and show up only in the status
    async fn fetch_and_merge(&mut self) -> Result<(), EngineError> {
        let fetched = self.remote.fetch(&self.session.user_id).await;
        if !self.session_live() {
            self.set_status(SyncStatus::Unauthenticated);
            return Ok(());
        }

        match fetched {
            Ok(Some(row)) => match self.registry.active_flag(self.clock.now()) {
                Some(flag) => self.defer(row, flag),
                None => self.merge_remote(&row),
            },
            Ok(None) => {
                tracing::info!(user_id = %self.session.user_id, "no remote row yet");
                self.needs_push = self.overlay.visible() != &Snapshot::default();
            }
            Err(err) => {
                tracing::warn!(error = %err, "fetch failed");
                self.status_after_failure(&SyncError::from(err));
            }
        }
        self.persist()?;
        self.publish();
        Ok(())
    }

    fn merge_remote(&mut self, row: &StateRow) {
        let incoming = checksum(&row.snapshot);
        self.overlay.reconcile_remote(&row.snapshot);
        self.metadata
            .record_pull(row.version, incoming.clone(), self.clock.now());
        if self
            .deferred
            .as_ref()
            .is_some_and(|deferred| self.metadata.is_stale(deferred.version))
        {
            self.deferred = None;
        }
        if checksum(self.overlay.visible()) != incoming {
            self.needs_push = true;
        }
        tracing::info!(
            version = row.version,
            repush = self.needs_push,
            "remote snapshot merged"
        );
    }

    fn defer(&mut self, row: StateRow, flag: ProtectionFlag) {
        tracing::debug!(%flag, version = row.version, "remote change deferred while protected");
        if self
            .deferred
            .as_ref()
            .map_or(true, |deferred| row.version > deferred.version)
        {
            self.deferred = Some(row);
        }
    }

    /// Merge the deferred row once no flag is active; returns whether it did
    fn apply_deferred(&mut self, now: Timestamp) -> bool {
        if self.registry.active_flag(now).is_some() {
            return false;
        }
        match self.deferred.take() {
            Some(row) if !self.metadata.is_stale(row.version) => {
                self.merge_remote(&row);
                true
            }
            _ => false,
        }
    }

    /// Flag keeping pushes back: one that always does, or any active flag
    /// while a deferred remote row still waits to be merged
    fn push_veto(&self, now: Timestamp) -> Option<ProtectionFlag> {
        let waiting = self.deferred.is_some();
        self.registry
            .active_flags(now)
            .find(|flag| waiting || flag.holds_pushes())
    }

    /// Timing ends once nothing is active, whether completed, cleared or rolled back
    fn release_finished_timing(&mut self) {
        if self.overlay.visible().active_index.is_none()
            && self.registry.clear(ProtectionFlag::ActiveTiming)
        {
            tracing::debug!("active timing finished");
        }
    }

    fn queue_transition(&mut self, event: QueueEvent) -> Result<(), EngineError> {
        let (queue, effects) = self.queue.transition(event, &self.clock);
        self.queue = queue;

        for effect in effects {
            match effect {
                QueueEffect::Enqueued { id } => {
                    tracing::debug!(%id, queued = self.queue.len(), "operation queued");
                }
                QueueEffect::Coalesced { id, into } => {
                    self.resolve(&id, Ok(()));
                    let events = self.overlay.confirm(&UpdateId::new(id.as_str()), None);
                    self.handle_overlay_events(events);
                    tracing::debug!(%id, %into, "mutation coalesced");
                }
                QueueEffect::Resolved { id, result } => {
                    let update_id = UpdateId::new(id.as_str());
                    let events = match &result {
                        Ok(()) => self.overlay.confirm(&update_id, None),
                        Err(err) => self.overlay.fail(&update_id, err.clone()),
                    };
                    self.resolve(&id, result);
                    self.handle_overlay_events(events);
                }
                QueueEffect::AckThrough { timestamp } => {
                    self.log.mark_synced_up_to(timestamp)?;
                }
                QueueEffect::RetryScheduled { .. } => {}
                QueueEffect::Deferred { ids } => {
                    tracing::debug!(count = ids.len(), "operations deferred");
                }
            }
        }
        Ok(())
    }

    fn handle_overlay_events(&mut self, events: Vec<OverlayEvent>) {
        for event in events {
            match event {
                OverlayEvent::Confirmed { id } | OverlayEvent::Rebased { id } => {
                    tracing::trace!(update = %id, "overlay settled");
                }
                OverlayEvent::RolledBack { id, error } | OverlayEvent::Dropped { id, error } => {
                    self.resolve(&OperationId::new(id.as_str()), Err(error));
                }
            }
        }
        self.release_finished_timing();
    }

    fn resolve(&mut self, id: &OperationId, outcome: TicketResult) {
        if let Some(waiter) = self.waiters.remove(id) {
            let _ = waiter.send(outcome);
        }
    }

    fn ensure_signed_in(&self) -> Result<(), EngineError> {
        if self.signed_out {
            return Err(EngineError::SignedOut);
        }
        match self.identity.session() {
            Some(session) if session == self.session => Ok(()),
            Some(_) => Err(EngineError::SessionChanged),
            None => Err(EngineError::SignedOut),
        }
    }

    fn session_live(&self) -> bool {
        self.identity.session().as_ref() == Some(&self.session)
    }

    fn persist(&self) -> Result<(), EngineError> {
        if self.signed_out {
            return Ok(());
        }
        self.store.save_snapshot(self.overlay.visible())?;
        self.store.save_metadata(&self.metadata)?;
        self.store.save_queue(&self.queue)?;
        self.store.save_flags(self.registry.persisted())?;
        Ok(())
    }

    fn publish(&self) {
        let visible = self.overlay.visible();
        self.snapshots.send_if_modified(|current| {
            if current == visible {
                false
            } else {
                *current = visible.clone();
                true
            }
        });
    }

    fn set_status(&self, status: SyncStatus) {
        let changed = self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
        if changed {
            tracing::debug!(%status, "sync status");
        }
    }

    fn status_after_failure(&self, error: &SyncError) {
        let status = match error {
            SyncError::AuthRequired => SyncStatus::Unauthenticated,
            SyncError::ProtectionActive(_) => SyncStatus::Idle,
            _ => SyncStatus::Degraded,
        };
        self.set_status(status);
    }

    fn settle_status(&self) {
        let status = if !self.online {
            SyncStatus::Offline
        } else if self.integrity.consecutive() > 0
            || self.queue.items().iter().any(|item| item.attempts > 0)
        {
            SyncStatus::Degraded
        } else {
            SyncStatus::Idle
        };
        self.set_status(status);
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
