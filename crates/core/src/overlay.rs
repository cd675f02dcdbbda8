// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optimistic update overlay
//!
//! Local mutations are rendered immediately and tracked as updates that are
//! later confirmed or rolled back. Each update remembers the snapshot it was
//! applied on top of (its rollback target), so overlapping updates form a
//! stack: a later update's rollback target already contains every earlier
//! still-pending update.
//!
//! Deadlines are plain timestamps checked by [`Overlay::tick`]:
//!
//! - an update not acknowledged (durably recorded) by its fail-fast deadline
//!   is rolled back with [`SyncError::NotRecorded`];
//! - an acknowledged update with no explicit outcome by its auto-confirm
//!   deadline is presumed successful.
//!
//! When an update fails, later updates are replayed on top of its rollback
//! target. A replay that no longer applies drops that update too.

use crate::clock::add_duration;
use crate::command::Command;
use crate::config::OverlayConfig;
use crate::error::SyncError;
use crate::id::UpdateId;
use crate::merge::merge;
use crate::snapshot::{Snapshot, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Pending,
    Confirmed,
}

/// One optimistic update; failed updates leave the stack immediately
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub id: UpdateId,
    pub command: Command,
    pub state: UpdateState,
    /// Visible snapshot immediately before this update was applied
    pub rollback: Snapshot,
    pub applied_at: Timestamp,
    pub acknowledged: bool,
    pub fail_fast_at: Timestamp,
    pub auto_confirm_at: Timestamp,
}

/// Transitions reported back to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Confirmed { id: UpdateId },
    RolledBack { id: UpdateId, error: SyncError },
    /// Replayed on a new base after an earlier update failed
    Rebased { id: UpdateId },
    /// Replay failed; the update is gone from the visible snapshot
    Dropped { id: UpdateId, error: SyncError },
}

#[derive(Debug, Clone)]
pub struct Overlay {
    visible: Snapshot,
    updates: Vec<PendingUpdate>,
    config: OverlayConfig,
}

impl Overlay {
    pub fn new(snapshot: Snapshot, config: OverlayConfig) -> Self {
        Self {
            visible: snapshot,
            updates: Vec::new(),
            config,
        }
    }

    /// The snapshot to render
    pub fn visible(&self) -> &Snapshot {
        &self.visible
    }

    /// Updates still awaiting an outcome, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &PendingUpdate> {
        self.updates
            .iter()
            .filter(|u| u.state == UpdateState::Pending)
    }

    pub fn is_pending(&self, id: &UpdateId) -> bool {
        self.pending().any(|u| &u.id == id)
    }

    /// Render a command speculatively
    pub fn apply(
        &mut self,
        id: UpdateId,
        command: Command,
        now: Timestamp,
    ) -> Result<&Snapshot, SyncError> {
        let next = command.apply(&self.visible, now)?;
        let rollback = std::mem::replace(&mut self.visible, next);
        self.updates.push(PendingUpdate {
            id,
            command,
            state: UpdateState::Pending,
            rollback,
            applied_at: now,
            acknowledged: false,
            fail_fast_at: add_duration(now, self.config.fail_fast),
            auto_confirm_at: add_duration(now, self.config.auto_confirm),
        });
        Ok(&self.visible)
    }

    /// The update was durably recorded; it will no longer fail fast
    pub fn acknowledge(&mut self, id: &UpdateId) -> bool {
        match self.find_pending_mut(id) {
            Some(update) => {
                update.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Mark an update confirmed, reconciling a remote snapshot if given
    pub fn confirm(&mut self, id: &UpdateId, remote: Option<&Snapshot>) -> Vec<OverlayEvent> {
        let mut events = Vec::new();
        if let Some(update) = self.find_pending_mut(id) {
            update.state = UpdateState::Confirmed;
            events.push(OverlayEvent::Confirmed { id: id.clone() });
        }
        if let Some(remote) = remote {
            self.reconcile_remote(remote);
        }
        self.collect_settled();
        events
    }

    /// Roll an update back and replay the updates applied after it
    pub fn fail(&mut self, id: &UpdateId, error: SyncError) -> Vec<OverlayEvent> {
        let Some(position) = self
            .updates
            .iter()
            .position(|u| &u.id == id && u.state == UpdateState::Pending)
        else {
            return Vec::new();
        };

        tracing::debug!(update = %id, %error, "optimistic update rolled back");
        let mut events = vec![OverlayEvent::RolledBack {
            id: id.clone(),
            error,
        }];

        let failed = self.updates.remove(position);
        let mut base = failed.rollback;
        let mut kept = Vec::with_capacity(self.updates.len());

        for (offset, mut update) in self.updates.drain(..).enumerate() {
            if offset < position {
                kept.push(update);
                continue;
            }
            match update.command.apply(&base, update.applied_at) {
                Ok(next) => {
                    update.rollback = std::mem::replace(&mut base, next);
                    events.push(OverlayEvent::Rebased {
                        id: update.id.clone(),
                    });
                    kept.push(update);
                }
                Err(err) => {
                    // Confirmed updates that no longer apply are simply gone;
                    // only pending ones have a caller left to tell
                    if update.state == UpdateState::Pending {
                        events.push(OverlayEvent::Dropped {
                            id: update.id.clone(),
                            error: err.into(),
                        });
                    }
                }
            }
        }

        self.updates = kept;
        self.visible = base;
        self.collect_settled();
        events
    }

    /// Apply deadlines that have passed
    pub fn tick(&mut self, now: Timestamp) -> Vec<OverlayEvent> {
        let expired: Vec<(UpdateId, bool)> = self
            .pending()
            .filter_map(|u| {
                if !u.acknowledged && now >= u.fail_fast_at {
                    Some((u.id.clone(), false))
                } else if u.acknowledged && now >= u.auto_confirm_at {
                    Some((u.id.clone(), true))
                } else {
                    None
                }
            })
            .collect();

        let mut events = Vec::new();
        for (id, confirm) in expired {
            if confirm {
                events.extend(self.confirm(&id, None));
            } else {
                events.extend(self.fail(&id, SyncError::NotRecorded));
            }
        }
        events
    }

    /// Merge a remote snapshot into the visible state and every rollback target
    pub fn reconcile_remote(&mut self, remote: &Snapshot) {
        self.visible = merge(&self.visible, remote);
        for update in &mut self.updates {
            update.rollback = merge(&update.rollback, remote);
        }
    }

    /// Drop every update without rolling back (sign-out)
    pub fn cancel_all(&mut self, reason: &str) -> Vec<OverlayEvent> {
        self.updates
            .drain(..)
            .filter(|u| u.state == UpdateState::Pending)
            .map(|u| OverlayEvent::Dropped {
                id: u.id,
                error: SyncError::cancelled(reason),
            })
            .collect()
    }

    /// Replace the visible snapshot and forget all updates
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.updates.clear();
        self.visible = snapshot;
    }

    /// Earliest deadline among pending updates
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.pending()
            .map(|u| {
                if u.acknowledged {
                    u.auto_confirm_at
                } else {
                    u.fail_fast_at
                }
            })
            .min()
    }

    fn find_pending_mut(&mut self, id: &UpdateId) -> Option<&mut PendingUpdate> {
        self.updates
            .iter_mut()
            .find(|u| &u.id == id && u.state == UpdateState::Pending)
    }

    /// Settled updates at the bottom of the stack can never be replayed again
    fn collect_settled(&mut self) {
        let settled = self
            .updates
            .iter()
            .take_while(|u| u.state != UpdateState::Pending)
            .count();
        self.updates.drain(..settled);
    }
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod tests;
