// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protection flag registry
//!
//! A protection flag is a short-lived veto on applying remote state while the
//! device does something sensitive locally (importing a list, restoring a
//! backup, timing an address). While any flag is active the merge path returns
//! the local snapshot unchanged.
//!
//! Flags expire by TTL so a crash between `acquire` and `clear` can never
//! leave remote application blocked forever. `ActiveTiming` is the exception:
//! it is held until cleared, and sign-out clears everything.
//!
//! Commands that start sensitive work name their flag through
//! [`Command::protection`](crate::command::Command::protection).

use crate::clock::{add_duration, elapsed_between};
use crate::snapshot::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Closed set of protection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionFlag {
    BulkImport,
    Restore,
    ActiveTiming,
}

impl ProtectionFlag {
    pub const ALL: [ProtectionFlag; 3] = [
        ProtectionFlag::BulkImport,
        ProtectionFlag::Restore,
        ProtectionFlag::ActiveTiming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionFlag::BulkImport => "bulk_import",
            ProtectionFlag::Restore => "restore",
            ProtectionFlag::ActiveTiming => "active_timing",
        }
    }

    /// Whether the flag also keeps local changes from being pushed.
    ///
    /// A restore replaces local state wholesale, so nothing is published until
    /// it finishes. The other flags only hold pushes back while a deferred
    /// remote row is still waiting to be merged.
    pub fn holds_pushes(&self) -> bool {
        matches!(self, ProtectionFlag::Restore)
    }
}

impl std::fmt::Display for ProtectionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Time-to-live per flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionPolicy {
    #[serde(with = "humantime_serde", default = "default_bulk_import")]
    pub bulk_import: Duration,
    #[serde(with = "humantime_serde", default = "default_restore")]
    pub restore: Duration,
}

fn default_bulk_import() -> Duration {
    Duration::from_secs(2)
}

fn default_restore() -> Duration {
    Duration::from_secs(30)
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self {
            bulk_import: default_bulk_import(),
            restore: default_restore(),
        }
    }
}

impl ProtectionPolicy {
    /// TTL for a flag; `None` means held until explicitly cleared
    pub fn ttl(&self, flag: ProtectionFlag) -> Option<Duration> {
        match flag {
            ProtectionFlag::BulkImport => Some(self.bulk_import),
            ProtectionFlag::Restore => Some(self.restore),
            ProtectionFlag::ActiveTiming => None,
        }
    }
}

/// Registry of held flags, keyed by flag with acquisition time
#[derive(Debug, Clone, Default)]
pub struct ProtectionRegistry {
    flags: BTreeMap<ProtectionFlag, Timestamp>,
    policy: ProtectionPolicy,
}

impl ProtectionRegistry {
    pub fn new(policy: ProtectionPolicy) -> Self {
        Self {
            flags: BTreeMap::new(),
            policy,
        }
    }

    /// Rebuild from persisted acquisition times.
    ///
    /// Acquisition times in the future (clock moved backwards) are clamped to
    /// `now` so the TTL still runs out.
    pub fn from_persisted(
        flags: BTreeMap<ProtectionFlag, Timestamp>,
        policy: ProtectionPolicy,
        now: Timestamp,
    ) -> Self {
        let flags = flags
            .into_iter()
            .map(|(flag, acquired_at)| (flag, acquired_at.min(now)))
            .collect();
        Self { flags, policy }
    }

    /// Acquisition times for persistence
    pub fn persisted(&self) -> &BTreeMap<ProtectionFlag, Timestamp> {
        &self.flags
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Stamp `now` on the flag; re-acquiring refreshes the TTL
    pub fn acquire(&mut self, flag: ProtectionFlag, now: Timestamp) {
        tracing::debug!(%flag, "protection acquired");
        self.flags.insert(flag, now);
    }

    /// Remove a flag; returns whether it was held
    pub fn clear(&mut self, flag: ProtectionFlag) -> bool {
        let held = self.flags.remove(&flag).is_some();
        if held {
            tracing::debug!(%flag, "protection cleared");
        }
        held
    }

    pub fn clear_all(&mut self) {
        self.flags.clear();
    }

    pub fn acquired_at(&self, flag: ProtectionFlag) -> Option<Timestamp> {
        self.flags.get(&flag).copied()
    }

    pub fn is_active(&self, flag: ProtectionFlag, now: Timestamp) -> bool {
        let Some(acquired_at) = self.flags.get(&flag) else {
            return false;
        };
        match self.policy.ttl(flag) {
            Some(ttl) => elapsed_between(*acquired_at, now) < ttl,
            None => true,
        }
    }

    /// First active flag, if any
    pub fn active_flag(&self, now: Timestamp) -> Option<ProtectionFlag> {
        self.active_flags(now).next()
    }

    pub fn active_flags(&self, now: Timestamp) -> impl Iterator<Item = ProtectionFlag> + '_ {
        self.flags
            .keys()
            .copied()
            .filter(move |flag| self.is_active(*flag, now))
    }

    /// When the flag stops vetoing; `None` if not held or held until cleared
    pub fn expires_at(&self, flag: ProtectionFlag) -> Option<Timestamp> {
        let acquired_at = self.flags.get(&flag)?;
        self.policy
            .ttl(flag)
            .map(|ttl| add_duration(*acquired_at, ttl))
    }

    /// Drop expired flags, returning the ones removed
    pub fn prune(&mut self, now: Timestamp) -> Vec<ProtectionFlag> {
        let expired: Vec<_> = self
            .flags
            .keys()
            .copied()
            .filter(|flag| !self.is_active(*flag, now))
            .collect();
        for flag in &expired {
            self.flags.remove(flag);
        }
        expired
    }
}

#[cfg(test)]
#[path = "protection_tests.rs"]
mod tests;
