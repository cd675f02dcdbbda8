// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed local mutations
//!
//! Every change a user makes is a [`Command`]. Applying a command to a
//! snapshot is a pure function producing a new snapshot; the same command
//! value is what gets appended to the operation log and queued for push.

use crate::protection::ProtectionFlag;
use crate::snapshot::{
    Address, Arrangement, ArrangementStatus, Completion, DaySession, LedgerAction, LedgerEntry,
    Outcome, Snapshot, Timestamp,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a command cannot be applied to a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("index {index} is outside the address list (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("index {0} is already completed")]
    AlreadyCompleted(usize),
    #[error("index {0} has no completion to undo")]
    NothingToUndo(usize),
    #[error("arrangement not found: {0}")]
    ArrangementNotFound(String),
    #[error("day {0} already started")]
    DayAlreadyStarted(NaiveDate),
    #[error("day {0} was never started")]
    DayNotStarted(NaiveDate),
    #[error("day {0} already ended")]
    DayAlreadyEnded(NaiveDate),
}

/// A typed mutation of the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Record the outcome of a visit
    Complete {
        index: usize,
        outcome: Outcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arrangement_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_reference: Option<String>,
    },
    /// Withdraw the visible completion of an index
    Undo { index: usize },
    /// Start timing an address
    SetActive { index: usize },
    ClearActive,
    /// Load a new working list; bumps the list version
    ReplaceAddresses { addresses: Vec<Address> },
    UpsertArrangement { arrangement: Arrangement },
    /// Soft-delete: marks the arrangement cancelled so the change survives merge
    CancelArrangement { id: String },
    StartDay { date: NaiveDate },
    EndDay { date: NaiveDate },
}

/// Operation `type` of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Complete,
    Undo,
    SetActive,
    ClearActive,
    ReplaceAddresses,
    UpsertArrangement,
    CancelArrangement,
    StartDay,
    EndDay,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Complete => "complete",
            CommandKind::Undo => "undo",
            CommandKind::SetActive => "set_active",
            CommandKind::ClearActive => "clear_active",
            CommandKind::ReplaceAddresses => "replace_addresses",
            CommandKind::UpsertArrangement => "upsert_arrangement",
            CommandKind::CancelArrangement => "cancel_arrangement",
            CommandKind::StartDay => "start_day",
            CommandKind::EndDay => "end_day",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of entity a command touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Completion,
    ActiveIndex,
    AddressList,
    Arrangement,
    DaySession,
}

/// The entity a command touches, used for dedup keys and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Option<String>,
}

impl EntityRef {
    fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }

    fn singleton(kind: EntityKind) -> Self {
        Self { kind, id: None }
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Complete { .. } => CommandKind::Complete,
            Command::Undo { .. } => CommandKind::Undo,
            Command::SetActive { .. } => CommandKind::SetActive,
            Command::ClearActive => CommandKind::ClearActive,
            Command::ReplaceAddresses { .. } => CommandKind::ReplaceAddresses,
            Command::UpsertArrangement { .. } => CommandKind::UpsertArrangement,
            Command::CancelArrangement { .. } => CommandKind::CancelArrangement,
            Command::StartDay { .. } => CommandKind::StartDay,
            Command::EndDay { .. } => CommandKind::EndDay,
        }
    }

    pub fn entity(&self) -> EntityRef {
        match self {
            Command::Complete { index, .. } | Command::Undo { index } => {
                EntityRef::new(EntityKind::Completion, index.to_string())
            }
            Command::SetActive { .. } | Command::ClearActive => {
                EntityRef::singleton(EntityKind::ActiveIndex)
            }
            Command::ReplaceAddresses { .. } => EntityRef::singleton(EntityKind::AddressList),
            Command::UpsertArrangement { arrangement } => {
                EntityRef::new(EntityKind::Arrangement, arrangement.id.clone())
            }
            Command::CancelArrangement { id } => EntityRef::new(EntityKind::Arrangement, id.clone()),
            Command::StartDay { date } | Command::EndDay { date } => {
                EntityRef::new(EntityKind::DaySession, date.to_string())
            }
        }
    }

    /// Protection flag the command acquires once recorded.
    ///
    /// Timing an address holds `ActiveTiming` until the active index is
    /// completed or cleared; replacing the list holds `BulkImport` for its TTL.
    pub fn protection(&self) -> Option<ProtectionFlag> {
        match self {
            Command::SetActive { .. } => Some(ProtectionFlag::ActiveTiming),
            Command::ReplaceAddresses { .. } => Some(ProtectionFlag::BulkImport),
            _ => None,
        }
    }

    /// Apply the command at time `now`, producing the next snapshot
    pub fn apply(&self, snapshot: &Snapshot, now: Timestamp) -> Result<Snapshot, CommandError> {
        let mut next = snapshot.clone();
        let version = next.current_list_version;

        match self {
            Command::Complete {
                index,
                outcome,
                amount,
                arrangement_id,
                case_reference,
            } => {
                let address = address_at(&next, *index)?.address.clone();
                if next.visible_completion(*index).is_some() {
                    return Err(CommandError::AlreadyCompleted(*index));
                }

                let mut completion = Completion::new(*index, address, *outcome, now, version);
                completion.amount = amount.clone();
                completion.arrangement_id = arrangement_id.clone();
                completion.case_reference = case_reference.clone();

                if next.active_index == Some(*index) {
                    if let Some(started) = next.active_start_time {
                        completion.time_spent_seconds =
                            Some(crate::clock::elapsed_between(started, now).as_secs());
                    }
                    next.active_index = None;
                    next.active_start_time = None;
                }

                next.completions.insert(0, completion);
                next.ledger.push(LedgerEntry {
                    at: now,
                    list_version: version,
                    index: *index,
                    action: LedgerAction::Completed,
                    outcome: Some(*outcome),
                });
            }

            Command::Undo { index } => {
                if next.visible_completion(*index).is_none() {
                    return Err(CommandError::NothingToUndo(*index));
                }
                next.completions
                    .retain(|c| !(c.index == *index && c.belongs_to(version)));
                next.ledger.push(LedgerEntry {
                    at: now,
                    list_version: version,
                    index: *index,
                    action: LedgerAction::Undone,
                    outcome: None,
                });
            }

            Command::SetActive { index } => {
                address_at(&next, *index)?;
                if next.visible_completion(*index).is_some() {
                    return Err(CommandError::AlreadyCompleted(*index));
                }
                next.active_index = Some(*index);
                next.active_start_time = Some(now);
            }

            Command::ClearActive => {
                next.active_index = None;
                next.active_start_time = None;
            }

            Command::ReplaceAddresses { addresses } => {
                next.addresses = addresses.clone();
                next.current_list_version = version.saturating_add(1);
                next.active_index = None;
                next.active_start_time = None;
            }

            Command::UpsertArrangement { arrangement } => {
                let mut arrangement = arrangement.clone();
                arrangement.updated_at = now;
                match next.arrangements.iter_mut().find(|a| a.id == arrangement.id) {
                    Some(existing) => *existing = arrangement,
                    None => next.arrangements.push(arrangement),
                }
            }

            Command::CancelArrangement { id } => {
                let existing = next
                    .arrangements
                    .iter_mut()
                    .find(|a| &a.id == id)
                    .ok_or_else(|| CommandError::ArrangementNotFound(id.clone()))?;
                existing.status = ArrangementStatus::Cancelled;
                existing.updated_at = now;
            }

            Command::StartDay { date } => {
                if next.day_session(*date).is_some() {
                    return Err(CommandError::DayAlreadyStarted(*date));
                }
                next.day_sessions.push(DaySession::started(*date, now));
            }

            Command::EndDay { date } => {
                let session = next
                    .day_sessions
                    .iter_mut()
                    .find(|s| s.date == *date)
                    .ok_or(CommandError::DayNotStarted(*date))?;
                if session.is_ended() {
                    return Err(CommandError::DayAlreadyEnded(*date));
                }
                session.end = Some(now.max(session.start));
            }
        }

        next.sort_canonical();
        Ok(next)
    }
}

fn address_at(snapshot: &Snapshot, index: usize) -> Result<&Address, CommandError> {
    snapshot
        .addresses
        .get(index)
        .ok_or(CommandError::IndexOutOfRange {
            index,
            len: snapshot.addresses.len(),
        })
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
