// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline operation queue
//!
//! Buffers operations that have not reached the remote store yet. The queue is
//! a plain value: [`OfflineQueue::transition`] returns the next queue and the
//! effects the caller must carry out (resolve a waiting caller, advance the
//! log acknowledgment boundary). Persistence and caller notification live in
//! the engine.
//!
//! Retry bookkeeping follows one rule: each failed attempt increments
//! `attempts`; once the retry policy gives up the operation is dropped and its
//! caller rejected. Nothing is dropped silently.

use crate::clock::{add_duration, Clock};
use crate::error::SyncError;
use crate::id::OperationId;
use crate::operation::{DedupKey, Operation};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::snapshot::Timestamp;
use serde::{Deserialize, Serialize};

/// An operation waiting to be pushed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub operation: Operation,
    pub dedup_key: DedupKey,
    pub enqueued_at: Timestamp,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Backoff deadline; the operation is skipped by batches until then
    #[serde(default)]
    pub not_before: Option<Timestamp>,
    /// Latest timestamp among identical operations coalesced into this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorbed_through: Option<Timestamp>,
}

impl QueuedOperation {
    pub fn new(operation: Operation, enqueued_at: Timestamp) -> Self {
        Self {
            dedup_key: operation.dedup_key(),
            operation,
            enqueued_at,
            attempts: 0,
            last_error: None,
            not_before: None,
            absorbed_through: None,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.operation.id
    }

    pub fn is_ready(&self, now: Timestamp) -> bool {
        self.not_before.map_or(true, |at| at <= now)
    }

    /// Log boundary reached once this operation lands, covering coalesced copies
    pub fn ack_timestamp(&self) -> Timestamp {
        self.absorbed_through
            .map_or(self.operation.timestamp, |at| at.max(self.operation.timestamp))
    }
}

/// Events that change queue state
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueue { operation: Operation },
    /// The push carrying these operations was accepted
    BatchSucceeded { ids: Vec<OperationId> },
    /// The push carrying these operations failed
    BatchFailed {
        ids: Vec<OperationId>,
        error: SyncError,
    },
    /// Drop everything (sign-out)
    Clear { reason: String },
}

/// Work the owner of the queue must carry out
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEffect {
    Enqueued {
        id: OperationId,
    },
    /// Identical to an operation already queued; `id`'s caller shares the
    /// outcome of `into`
    Coalesced {
        id: OperationId,
        into: OperationId,
    },
    /// Final outcome for the operation's caller
    Resolved {
        id: OperationId,
        result: Result<(), SyncError>,
    },
    /// Advance the operation log acknowledgment boundary
    AckThrough { timestamp: Timestamp },
    RetryScheduled {
        id: OperationId,
        attempts: u32,
        not_before: Timestamp,
    },
    /// Failure that does not count against the retry budget
    Deferred { ids: Vec<OperationId> },
}

/// Bounded FIFO of operations awaiting push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueue {
    items: Vec<QueuedOperation>,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
    #[serde(skip, default)]
    retry: RetryPolicy,
}

fn default_capacity() -> usize {
    1000
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(default_capacity(), RetryPolicy::default())
    }
}

impl OfflineQueue {
    pub fn new(capacity: usize, retry: RetryPolicy) -> Self {
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
            retry,
        }
    }

    /// Re-apply limits to a queue loaded from disk.
    ///
    /// If the capacity shrank, the oldest entries beyond it are returned so
    /// their callers can be rejected.
    pub fn with_limits(mut self, capacity: usize, retry: RetryPolicy) -> (Self, Vec<QueuedOperation>) {
        self.capacity = capacity.max(1);
        self.retry = retry;
        let excess = self.items.len().saturating_sub(self.capacity);
        let evicted = self.items.drain(..excess).collect();
        (self, evicted)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[QueuedOperation] {
        &self.items
    }

    pub fn get(&self, id: &OperationId) -> Option<&QueuedOperation> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Up to `size` operations whose backoff has elapsed, oldest first
    pub fn next_batch(&self, size: usize, now: Timestamp) -> Vec<Operation> {
        self.items
            .iter()
            .filter(|item| item.is_ready(now))
            .take(size)
            .map(|item| item.operation.clone())
            .collect()
    }

    /// Earliest backoff deadline still in the future of `now`
    pub fn next_ready_at(&self, now: Timestamp) -> Option<Timestamp> {
        self.items
            .iter()
            .filter_map(|item| item.not_before)
            .filter(|at| *at > now)
            .min()
    }

    /// Pure transition function - returns new state and effects
    pub fn transition(&self, event: QueueEvent, clock: &impl Clock) -> (OfflineQueue, Vec<QueueEffect>) {
        let now = clock.now();

        match event {
            QueueEvent::Enqueue { operation } => self.enqueue(operation, now),
            QueueEvent::BatchSucceeded { ids } => {
                let mut queue = self.clone();
                let (removed, effects) = queue.resolve_success(&ids);
                if removed > 0 {
                    tracing::debug!(removed, remaining = queue.len(), "batch acknowledged");
                }
                (queue, effects)
            }
            QueueEvent::BatchFailed { ids, error } => self.fail_batch(&ids, &error, now),
            QueueEvent::Clear { reason } => {
                let effects = self
                    .items
                    .iter()
                    .map(|item| QueueEffect::Resolved {
                        id: item.id().clone(),
                        result: Err(SyncError::cancelled(reason.clone())),
                    })
                    .collect();
                let queue = OfflineQueue {
                    items: Vec::new(),
                    ..self.clone()
                };
                (queue, effects)
            }
        }
    }

    fn enqueue(&self, operation: Operation, now: Timestamp) -> (OfflineQueue, Vec<QueueEffect>) {
        let candidate = QueuedOperation::new(operation, now);

        let mut queue = self.clone();
        let max_attempts = self.retry.max_attempts;
        let existing = queue.items.iter_mut().find(|item| {
            item.dedup_key == candidate.dedup_key && item.attempts < max_attempts
        });
        if let Some(existing) = existing {
            tracing::debug!(
                id = %candidate.id(),
                into = %existing.id(),
                "identical operation already queued"
            );
            let through = existing.ack_timestamp().max(candidate.operation.timestamp);
            existing.absorbed_through = Some(through);
            let effects = vec![QueueEffect::Coalesced {
                id: candidate.id().clone(),
                into: existing.id().clone(),
            }];
            return (queue, effects);
        }

        let mut effects = Vec::new();

        while queue.items.len() >= queue.capacity {
            let evicted = queue.items.remove(0);
            tracing::warn!(id = %evicted.id(), capacity = queue.capacity, "offline queue full, evicting oldest");
            effects.push(QueueEffect::Resolved {
                id: evicted.id().clone(),
                result: Err(SyncError::QueueOverflow {
                    capacity: queue.capacity,
                }),
            });
        }

        effects.push(QueueEffect::Enqueued {
            id: candidate.id().clone(),
        });
        queue.items.push(candidate);
        (queue, effects)
    }

    /// Remove succeeded operations; returns how many were present
    fn resolve_success(&mut self, ids: &[OperationId]) -> (usize, Vec<QueueEffect>) {
        let (done, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| ids.contains(item.id()));
        self.items = remaining;

        let mut effects: Vec<QueueEffect> = done
            .iter()
            .map(|item| QueueEffect::Resolved {
                id: item.id().clone(),
                result: Ok(()),
            })
            .collect();
        if let Some(timestamp) = done.iter().map(QueuedOperation::ack_timestamp).max() {
            effects.push(QueueEffect::AckThrough { timestamp });
        }
        (done.len(), effects)
    }

    fn fail_batch(
        &self,
        ids: &[OperationId],
        error: &SyncError,
        now: Timestamp,
    ) -> (OfflineQueue, Vec<QueueEffect>) {
        let mut queue = self.clone();
        let mut effects = Vec::new();
        let mut succeeded = Vec::new();
        let mut deferred = Vec::new();
        let mut dropped = Vec::new();

        for item in queue.items.iter_mut().filter(|item| ids.contains(item.id())) {
            let attempts = item.attempts + 1;
            match self.retry.decide(attempts, error) {
                RetryDecision::Succeeded => succeeded.push(item.id().clone()),
                RetryDecision::Defer => deferred.push(item.id().clone()),
                RetryDecision::Retry { after } => {
                    let not_before = add_duration(now, after);
                    item.attempts = attempts;
                    item.last_error = Some(error.to_string());
                    item.not_before = Some(not_before);
                    tracing::warn!(id = %item.id(), attempts, ?after, %error, "push failed, retry scheduled");
                    effects.push(QueueEffect::RetryScheduled {
                        id: item.id().clone(),
                        attempts,
                        not_before,
                    });
                }
                RetryDecision::GiveUp(reason) => {
                    tracing::warn!(id = %item.id(), attempts, %reason, "operation dropped");
                    dropped.push((item.id().clone(), reason));
                }
            }
        }

        if !dropped.is_empty() {
            queue
                .items
                .retain(|item| !dropped.iter().any(|(id, _)| id == item.id()));
            effects.extend(dropped.into_iter().map(|(id, reason)| QueueEffect::Resolved {
                id,
                result: Err(reason),
            }));
        }
        if !succeeded.is_empty() {
            let (_, resolved) = queue.resolve_success(&succeeded);
            effects.extend(resolved);
        }
        if !deferred.is_empty() {
            effects.push(QueueEffect::Deferred { ids: deferred });
        }

        (queue, effects)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
