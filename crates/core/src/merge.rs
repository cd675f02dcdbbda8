// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State merge engine
//!
//! [`merge`] reconciles two full snapshots from different devices into one.
//! It is a pure function of its inputs: no clock, no I/O, no ambient state.
//! Nothing is assumed about causal order between the two sides.
//!
//! ## Rules
//!
//! | entity | identity | winner |
//! |---|---|---|
//! | completion | `(timestamp, index, outcome)` | union; collisions merge field by field |
//! | address list + version | whole list | higher version, unless its list is empty |
//! | arrangement | `id` | later `updatedAt`, whole record |
//! | day session | `date` | ended beats open, then later end |
//! | ledger event | whole event | union |
//! | active index | singleton | remote if set, else local |
//!
//! After the union, each `(listVersion, index)` slot keeps only its newest
//! completion, and a slot whose newest ledger event is an undo drops every
//! completion recorded at or before that undo.
//!
//! Properties: `merge(s, s) == s` for normalized `s`; the resulting list
//! version is never below either input. Three-way associativity holds for
//! non-overlapping edits only.

use crate::protection::{ProtectionFlag, ProtectionRegistry};
use crate::snapshot::{
    completion_order, Address, Arrangement, Completion, CompletionKey, DaySession, LedgerAction,
    LedgerEntry, Snapshot, Timestamp,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Which input a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

/// Diagnostics describing what a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Completions present on both sides under the same key
    pub completion_collisions: usize,
    /// Older completions dropped because a newer one holds the same slot
    pub superseded_completions: usize,
    /// Completions hidden by a later undo
    pub undone_completions: usize,
    /// Completions whose list version had to be back-filled
    pub backfilled_versions: usize,
    /// Side whose address list was kept
    pub addresses_from: Option<Side>,
    /// The higher version's list was empty and the other side's list was kept
    pub empty_list_rejected: bool,
    /// Arrangements where the remote copy replaced a different local copy
    pub arrangements_from_remote: usize,
    /// Day sessions where the remote copy replaced a different local copy
    pub day_sessions_from_remote: usize,
}

/// Merged snapshot plus diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub report: MergeReport,
}

/// Result of a merge attempted behind the protection registry
#[derive(Debug, Clone, PartialEq)]
pub enum MergeDecision {
    Applied(MergeOutcome),
    /// A flag vetoed remote application; the local snapshot stands
    Deferred { flag: ProtectionFlag },
}

impl MergeDecision {
    /// Snapshot to make visible: the merge result, or `local` when deferred
    pub fn into_snapshot(self, local: &Snapshot) -> Snapshot {
        match self {
            MergeDecision::Applied(outcome) => outcome.snapshot,
            MergeDecision::Deferred { .. } => local.clone(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, MergeDecision::Deferred { .. })
    }
}

/// Reconcile two snapshots
pub fn merge(local: &Snapshot, remote: &Snapshot) -> Snapshot {
    merge_with_report(local, remote).snapshot
}

/// Merge only if no protection flag is active at `now`
pub fn guarded_merge(
    local: &Snapshot,
    remote: &Snapshot,
    registry: &ProtectionRegistry,
    now: Timestamp,
) -> MergeDecision {
    match registry.active_flag(now) {
        Some(flag) => {
            tracing::debug!(%flag, "remote snapshot deferred by protection flag");
            MergeDecision::Deferred { flag }
        }
        None => MergeDecision::Applied(merge_with_report(local, remote)),
    }
}

/// Reconcile two snapshots and report what happened
pub fn merge_with_report(local: &Snapshot, remote: &Snapshot) -> MergeOutcome {
    let mut report = MergeReport::default();

    let (addresses, current_list_version) = merge_address_lists(local, remote, &mut report);
    let ledger = merge_ledger(&local.ledger, &remote.ledger);
    let backfill = local.current_list_version.max(remote.current_list_version);
    let completions = merge_completions(local, remote, backfill, &ledger, &mut report);
    let arrangements = merge_arrangements(&local.arrangements, &remote.arrangements, &mut report);
    let day_sessions = merge_day_sessions(&local.day_sessions, &remote.day_sessions, &mut report);

    let (active_index, active_start_time) = match remote.active_index {
        Some(index) => (Some(index), remote.active_start_time),
        None => (local.active_index, local.active_start_time.filter(|_| local.active_index.is_some())),
    };

    let snapshot = Snapshot {
        addresses,
        completions,
        arrangements,
        day_sessions,
        current_list_version,
        active_index,
        active_start_time,
        ledger,
    };

    MergeOutcome { snapshot, report }
}

/// Address list and list version are resolved together
fn merge_address_lists(
    local: &Snapshot,
    remote: &Snapshot,
    report: &mut MergeReport,
) -> (Vec<Address>, u64) {
    let local_version = local.current_list_version;
    let remote_version = remote.current_list_version;

    let (side, rescued) = match local_version.cmp(&remote_version) {
        Ordering::Greater => prefer_higher(Side::Local, &local.addresses, &remote.addresses),
        Ordering::Less => prefer_higher(Side::Remote, &remote.addresses, &local.addresses),
        Ordering::Equal => {
            let side = match (local.addresses.is_empty(), remote.addresses.is_empty()) {
                (false, true) => Side::Local,
                (true, _) => Side::Remote,
                (false, false) if local.addresses.len() > remote.addresses.len() => Side::Local,
                (false, false) => Side::Remote,
            };
            (side, false)
        }
    };

    report.addresses_from = Some(side);
    report.empty_list_rejected = rescued;
    if rescued {
        tracing::debug!(
            local_version,
            remote_version,
            "higher list version arrived empty; keeping populated list"
        );
    }

    let addresses = match side {
        Side::Local => local.addresses.clone(),
        Side::Remote => remote.addresses.clone(),
    };
    (addresses, local_version.max(remote_version))
}

/// Pick the higher version's side unless its list is empty and the other is not
fn prefer_higher(higher: Side, higher_list: &[Address], lower_list: &[Address]) -> (Side, bool) {
    if higher_list.is_empty() && !lower_list.is_empty() {
        let lower = match higher {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        };
        (lower, true)
    } else {
        (higher, false)
    }
}

fn merge_ledger(local: &[LedgerEntry], remote: &[LedgerEntry]) -> Vec<LedgerEntry> {
    let events: BTreeSet<LedgerEntry> = local.iter().chain(remote.iter()).cloned().collect();
    events.into_iter().collect()
}

fn merge_completions(
    local: &Snapshot,
    remote: &Snapshot,
    backfill: u64,
    ledger: &[LedgerEntry],
    report: &mut MergeReport,
) -> Vec<Completion> {
    let mut by_key: BTreeMap<CompletionKey, Completion> = BTreeMap::new();

    for completion in &local.completions {
        by_key.insert(completion.key(), completion.clone());
    }
    for completion in &remote.completions {
        match by_key.get_mut(&completion.key()) {
            Some(existing) => {
                report.completion_collisions += 1;
                *existing = merge_completion_fields(completion, existing);
            }
            None => {
                by_key.insert(completion.key(), completion.clone());
            }
        }
    }

    // Group by slot, back-filling list versions only where absent
    let mut slots: BTreeMap<(u64, usize), Vec<Completion>> = BTreeMap::new();
    for (_, mut completion) in by_key {
        if completion.list_version.is_none() {
            completion.list_version = Some(backfill);
            report.backfilled_versions += 1;
        }
        let version = completion.list_version.unwrap_or(backfill);
        slots
            .entry((version, completion.index))
            .or_default()
            .push(completion);
    }

    let latest_events = latest_ledger_events(ledger);
    let mut merged = Vec::new();

    for (slot, mut candidates) in slots {
        if let Some(event) = latest_events.get(&slot) {
            if event.action == LedgerAction::Undone {
                let before = candidates.len();
                candidates.retain(|c| c.timestamp > event.at);
                report.undone_completions += before - candidates.len();
            }
        }

        let newest = candidates
            .into_iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(b.outcome.cmp(&a.outcome)));
        if let Some(newest) = newest {
            merged.push(newest);
        }
    }

    let total_candidates = local.completions.len() + remote.completions.len()
        - report.completion_collisions
        - report.undone_completions;
    report.superseded_completions = total_candidates.saturating_sub(merged.len());

    merged.sort_by(completion_order);
    merged
}

/// Field-level merge of two copies of the same completion; `preferred` wins
/// every field it has a value for
fn merge_completion_fields(preferred: &Completion, other: &Completion) -> Completion {
    let (recent, older) = if other.timestamp > preferred.timestamp {
        (other, preferred)
    } else {
        (preferred, other)
    };

    Completion {
        index: recent.index,
        address: if recent.address.is_empty() {
            older.address.clone()
        } else {
            recent.address.clone()
        },
        outcome: recent.outcome,
        timestamp: recent.timestamp,
        list_version: match (recent.list_version, older.list_version) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        },
        amount: recent.amount.clone().or_else(|| older.amount.clone()),
        arrangement_id: recent
            .arrangement_id
            .clone()
            .or_else(|| older.arrangement_id.clone()),
        time_spent_seconds: recent.time_spent_seconds.or(older.time_spent_seconds),
        case_reference: recent
            .case_reference
            .clone()
            .or_else(|| older.case_reference.clone()),
    }
}

fn latest_ledger_events(ledger: &[LedgerEntry]) -> BTreeMap<(u64, usize), &LedgerEntry> {
    let mut latest: BTreeMap<(u64, usize), &LedgerEntry> = BTreeMap::new();
    for event in ledger {
        let slot = (event.list_version, event.index);
        match latest.get(&slot) {
            Some(current) if *current >= event => {}
            _ => {
                latest.insert(slot, event);
            }
        }
    }
    latest
}

fn merge_arrangements(
    local: &[Arrangement],
    remote: &[Arrangement],
    report: &mut MergeReport,
) -> Vec<Arrangement> {
    let mut by_id: BTreeMap<String, Arrangement> = local
        .iter()
        .map(|a| (a.id.clone(), a.clone()))
        .collect();

    for incoming in remote {
        match by_id.get_mut(&incoming.id) {
            Some(existing) => {
                if incoming.updated_at >= existing.updated_at && incoming != existing {
                    report.arrangements_from_remote += 1;
                    *existing = incoming.clone();
                }
            }
            None => {
                by_id.insert(incoming.id.clone(), incoming.clone());
            }
        }
    }

    by_id.into_values().collect()
}

fn merge_day_sessions(
    local: &[DaySession],
    remote: &[DaySession],
    report: &mut MergeReport,
) -> Vec<DaySession> {
    let mut by_date: BTreeMap<chrono::NaiveDate, DaySession> =
        local.iter().map(|s| (s.date, s.clone())).collect();

    for incoming in remote {
        match by_date.get_mut(&incoming.date) {
            Some(existing) => {
                if remote_session_wins(existing, incoming) && incoming != existing {
                    report.day_sessions_from_remote += 1;
                    *existing = incoming.clone();
                }
            }
            None => {
                by_date.insert(incoming.date, incoming.clone());
            }
        }
    }

    by_date.into_values().collect()
}

/// Ended beats open; between ended sessions the later end wins; between open
/// sessions the earlier start wins. Exact ties go to remote.
fn remote_session_wins(local: &DaySession, remote: &DaySession) -> bool {
    match (local.end, remote.end) {
        (Some(l), Some(r)) => r >= l,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (None, None) => remote.start <= local.start,
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
