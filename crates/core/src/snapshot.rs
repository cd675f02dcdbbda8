// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot data model
//!
//! A [`Snapshot`] is the complete reconciled state for one user: the working
//! address list, recorded visit outcomes, payment arrangements, day sessions
//! and the completion ledger. Snapshots are immutable values; commands and the
//! merge engine produce new ones.
//!
//! Field names serialize in camelCase because the same document is shared with
//! peers through the remote store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub type Timestamp = DateTime<Utc>;

/// One entry of the working address list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Fields this build does not know about, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            lat: None,
            lng: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Result of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    /// Paid in full
    #[serde(rename = "PIF")]
    PaidInFull,
    /// Doorstep absent, no contact made
    #[serde(rename = "DA")]
    DoorstepAbsent,
    Done,
    /// Payment arrangement made
    #[serde(rename = "ARR")]
    Arrangement,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::PaidInFull => "PIF",
            Outcome::DoorstepAbsent => "DA",
            Outcome::Done => "Done",
            Outcome::Arrangement => "ARR",
        };
        write!(f, "{}", s)
    }
}

/// A recorded visit outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub index: usize,
    pub address: String,
    pub outcome: Outcome,
    pub timestamp: Timestamp,
    /// List version the completion was recorded against; absent in legacy data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrangement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_reference: Option<String>,
}

/// Merge identity of a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionKey {
    pub timestamp: Timestamp,
    pub index: usize,
    pub outcome: Outcome,
}

impl Completion {
    pub fn new(
        index: usize,
        address: impl Into<String>,
        outcome: Outcome,
        timestamp: Timestamp,
        list_version: u64,
    ) -> Self {
        Self {
            index,
            address: address.into(),
            outcome,
            timestamp,
            list_version: Some(list_version),
            amount: None,
            arrangement_id: None,
            time_spent_seconds: None,
            case_reference: None,
        }
    }

    pub fn key(&self) -> CompletionKey {
        CompletionKey {
            timestamp: self.timestamp,
            index: self.index,
            outcome: self.outcome,
        }
    }

    /// Whether this completion counts against the given list version
    pub fn belongs_to(&self, list_version: u64) -> bool {
        self.list_version == Some(list_version)
    }
}

/// Display order for completions: newest first, then index, then outcome
pub fn completion_order(a: &Completion, b: &Completion) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then(a.index.cmp(&b.index))
        .then(a.outcome.cmp(&b.outcome))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrangementStatus {
    #[default]
    Scheduled,
    Completed,
    Missed,
    Cancelled,
}

/// A payment arrangement agreed at a visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrangement {
    pub id: String,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ArrangementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Arrangement {
    pub fn new(id: impl Into<String>, address: impl Into<String>, updated_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            updated_at,
            address: address.into(),
            address_index: None,
            amount: None,
            due_date: None,
            status: ArrangementStatus::Scheduled,
            notes: None,
            extra: BTreeMap::new(),
        }
    }
}

/// One working day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySession {
    pub date: NaiveDate,
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

impl DaySession {
    pub fn started(date: NaiveDate, start: Timestamp) -> Self {
        Self {
            date,
            start,
            end: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerAction {
    Completed,
    Undone,
}

/// A completion or undo event; the latest event per slot decides visibility
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub at: Timestamp,
    pub list_version: u64,
    pub index: usize,
    pub action: LedgerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// The full reconciled state for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub completions: Vec<Completion>,
    #[serde(default)]
    pub arrangements: Vec<Arrangement>,
    #[serde(default)]
    pub day_sessions: Vec<DaySession>,
    #[serde(default)]
    pub current_list_version: u64,
    #[serde(default)]
    pub active_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_start_time: Option<Timestamp>,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot holding only an address list at the given version
    pub fn with_addresses(addresses: Vec<Address>, list_version: u64) -> Self {
        Self {
            addresses,
            current_list_version: list_version,
            ..Self::default()
        }
    }

    /// Completion currently visible for an index of the working list
    pub fn visible_completion(&self, index: usize) -> Option<&Completion> {
        self.completions
            .iter()
            .filter(|c| c.index == index && c.belongs_to(self.current_list_version))
            .max_by_key(|c| c.timestamp)
    }

    /// Completions recorded against the working list
    pub fn current_completions(&self) -> impl Iterator<Item = &Completion> {
        let version = self.current_list_version;
        self.completions.iter().filter(move |c| c.belongs_to(version))
    }

    /// Latest ledger action for an index of the working list
    pub fn ledger_status(&self, index: usize) -> Option<LedgerAction> {
        self.ledger
            .iter()
            .filter(|e| e.index == index && e.list_version == self.current_list_version)
            .max()
            .map(|e| e.action)
    }

    pub fn day_session(&self, date: NaiveDate) -> Option<&DaySession> {
        self.day_sessions.iter().find(|s| s.date == date)
    }

    pub fn arrangement(&self, id: &str) -> Option<&Arrangement> {
        self.arrangements.iter().find(|a| a.id == id)
    }

    /// Number of list entries with a visible completion
    pub fn completed_count(&self) -> usize {
        (0..self.addresses.len())
            .filter(|i| self.visible_completion(*i).is_some())
            .count()
    }

    /// Put collections in canonical order and back-fill missing list versions.
    ///
    /// Merge output is always normalized; normalizing an already normalized
    /// snapshot is a no-op.
    pub fn normalized(mut self) -> Self {
        let version = self.current_list_version;
        for completion in &mut self.completions {
            if completion.list_version.is_none() {
                completion.list_version = Some(version);
            }
        }
        self.sort_canonical();
        self
    }

    /// Put collections in the order merge produces, leaving their contents alone
    pub fn sort_canonical(&mut self) {
        self.completions.sort_by(completion_order);
        self.arrangements.sort_by(|a, b| a.id.cmp(&b.id));
        self.day_sessions.sort_by(|a, b| a.date.cmp(&b.date));
        self.ledger.sort();
        self.ledger.dedup();
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
