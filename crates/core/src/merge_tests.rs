// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};
use crate::command::Command;
use crate::snapshot::{ArrangementStatus, Outcome};
use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::time::Duration;

fn at(h: u32, m: u32, s: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
}

fn addresses(names: &[&str]) -> Vec<Address> {
    names.iter().map(|n| Address::new(*n)).collect()
}

fn list(names: &[&str], version: u64) -> Snapshot {
    Snapshot::with_addresses(addresses(names), version)
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
}

// --- scenario from the field ---

#[test]
fn stale_device_completion_loses_to_newer_one_in_both_directions() {
    let mut device_a = list(&["1 High St", "2 High St"], 6);
    device_a.completions.push(Completion::new(
        0,
        "1 High St",
        Outcome::Done,
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 7, 21).unwrap(),
        6,
    ));

    let mut device_b = list(&["1 High St", "2 High St"], 6);
    device_b.completions.push(Completion::new(
        0,
        "1 High St",
        Outcome::DoorstepAbsent,
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 5, 0).unwrap(),
        6,
    ));

    for merged in [merge(&device_a, &device_b), merge(&device_b, &device_a)] {
        let for_zero: Vec<_> = merged.completions.iter().filter(|c| c.index == 0).collect();
        assert_eq!(for_zero.len(), 1);
        assert_eq!(
            for_zero[0].timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "2024-03-10T08:07:21.000Z"
        );
        assert_eq!(for_zero[0].list_version, Some(6));
        assert_eq!(for_zero[0].outcome, Outcome::Done);
    }
}

// --- addresses and list version ---

#[test]
fn higher_version_list_wins() {
    let local = list(&["a", "b"], 3);
    let remote = list(&["x"], 4);
    let outcome = merge_with_report(&local, &remote);

    assert_eq!(outcome.snapshot.addresses, addresses(&["x"]));
    assert_eq!(outcome.snapshot.current_list_version, 4);
    assert_eq!(outcome.report.addresses_from, Some(Side::Remote));
    assert!(!outcome.report.empty_list_rejected);
}

#[test]
fn empty_higher_version_keeps_populated_list_but_adopts_version() {
    let local = list(&["a", "b"], 6);
    let remote = list(&[], 7);
    let outcome = merge_with_report(&local, &remote);

    assert_eq!(outcome.snapshot.addresses, addresses(&["a", "b"]));
    assert_eq!(outcome.snapshot.current_list_version, 7);
    assert!(outcome.report.empty_list_rejected);
    assert_eq!(outcome.report.addresses_from, Some(Side::Local));
}

#[test]
fn empty_local_at_higher_version_keeps_remote_list() {
    let local = list(&[], 9);
    let remote = list(&["r"], 2);
    let merged = merge(&local, &remote);

    assert_eq!(merged.addresses, addresses(&["r"]));
    assert_eq!(merged.current_list_version, 9);
}

#[test]
fn equal_versions_prefer_non_empty_then_longer_then_remote() {
    let merged = merge(&list(&["a"], 2), &list(&[], 2));
    assert_eq!(merged.addresses, addresses(&["a"]));

    let merged = merge(&list(&["a", "b"], 2), &list(&["x"], 2));
    assert_eq!(merged.addresses, addresses(&["a", "b"]));

    let merged = merge(&list(&["a"], 2), &list(&["x"], 2));
    assert_eq!(merged.addresses, addresses(&["x"]));
}

// --- completions ---

#[test]
fn stale_replay_does_not_remove_merged_completion() {
    let base = list(&["a", "b"], 6);
    let mut with_completion = base.clone();
    with_completion
        .completions
        .push(Completion::new(1, "b", Outcome::PaidInFull, at(9, 0, 0), 6));

    let merged = merge(&base, &with_completion);
    let replayed = merge(&merged, &base);

    assert_eq!(replayed.completions.len(), 1);
    assert_eq!(replayed.completions[0].index, 1);
}

#[test]
fn key_collision_merges_fields_without_losing_data() {
    let mut local_completion = Completion::new(0, "a", Outcome::Arrangement, at(9, 0, 0), 6);
    local_completion.amount = Some("40.00".to_string());
    let mut remote_completion = local_completion.clone();
    remote_completion.amount = None;
    remote_completion.arrangement_id = Some("arr-1".to_string());

    let mut local = list(&["a"], 6);
    local.completions.push(local_completion);
    let mut remote = list(&["a"], 6);
    remote.completions.push(remote_completion);

    let outcome = merge_with_report(&local, &remote);
    let merged = &outcome.snapshot.completions[0];
    assert_eq!(outcome.snapshot.completions.len(), 1);
    assert_eq!(merged.amount.as_deref(), Some("40.00"));
    assert_eq!(merged.arrangement_id.as_deref(), Some("arr-1"));
    assert_eq!(outcome.report.completion_collisions, 1);
}

#[test]
fn missing_list_version_is_backfilled_with_max_version() {
    let mut legacy = Completion::new(0, "a", Outcome::Done, at(9, 0, 0), 0);
    legacy.list_version = None;
    let mut local = list(&["a"], 4);
    local.completions.push(legacy);
    let remote = list(&["a"], 5);

    let outcome = merge_with_report(&local, &remote);
    assert_eq!(outcome.snapshot.completions[0].list_version, Some(5));
    assert_eq!(outcome.report.backfilled_versions, 1);
}

#[test]
fn recorded_list_version_is_never_promoted() {
    let mut local = list(&["a"], 4);
    local
        .completions
        .push(Completion::new(0, "a", Outcome::Done, at(9, 0, 0), 4));
    let remote = list(&["a", "b"], 5);

    let merged = merge(&local, &remote);
    assert_eq!(merged.completions[0].list_version, Some(4));
    assert!(merged.visible_completion(0).is_none());
}

#[test]
fn completions_are_ordered_newest_first() {
    let mut local = list(&["a", "b", "c"], 1);
    local
        .completions
        .push(Completion::new(0, "a", Outcome::Done, at(8, 0, 0), 1));
    let mut remote = list(&["a", "b", "c"], 1);
    remote
        .completions
        .push(Completion::new(2, "c", Outcome::Done, at(10, 0, 0), 1));
    remote
        .completions
        .push(Completion::new(1, "b", Outcome::Done, at(9, 0, 0), 1));

    let merged = merge(&local, &remote);
    let indices: Vec<_> = merged.completions.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![2, 1, 0]);
}

#[test]
fn later_undo_outranks_earlier_completion() {
    let mut local = list(&["a"], 3);
    local
        .completions
        .push(Completion::new(0, "a", Outcome::Done, at(9, 0, 0), 3));
    local.ledger.push(LedgerEntry {
        at: at(9, 0, 0),
        list_version: 3,
        index: 0,
        action: LedgerAction::Completed,
        outcome: Some(Outcome::Done),
    });

    let mut remote = local.clone();
    remote.completions.clear();
    remote.ledger.push(LedgerEntry {
        at: at(9, 5, 0),
        list_version: 3,
        index: 0,
        action: LedgerAction::Undone,
        outcome: None,
    });

    for outcome in [
        merge_with_report(&local, &remote),
        merge_with_report(&remote, &local),
    ] {
        assert!(outcome.snapshot.visible_completion(0).is_none());
        assert_eq!(
            outcome.snapshot.ledger_status(0),
            Some(LedgerAction::Undone)
        );
    }
    assert_eq!(merge_with_report(&local, &remote).report.undone_completions, 1);
}

#[test]
fn completion_after_undo_survives() {
    let mut snapshot = list(&["a"], 3);
    snapshot.ledger.push(LedgerEntry {
        at: at(9, 0, 0),
        list_version: 3,
        index: 0,
        action: LedgerAction::Undone,
        outcome: None,
    });
    let mut remote = snapshot.clone();
    remote
        .completions
        .push(Completion::new(0, "a", Outcome::PaidInFull, at(9, 10, 0), 3));
    remote.ledger.push(LedgerEntry {
        at: at(9, 10, 0),
        list_version: 3,
        index: 0,
        action: LedgerAction::Completed,
        outcome: Some(Outcome::PaidInFull),
    });

    let merged = merge(&snapshot, &remote);
    assert_eq!(
        merged.visible_completion(0).map(|c| c.outcome),
        Some(Outcome::PaidInFull)
    );
}

// --- arrangements, sessions, active index ---

#[test]
fn later_arrangement_wins_wholesale() {
    let mut local = Snapshot::new();
    let mut older = Arrangement::new("arr-1", "a", at(8, 0, 0));
    older.notes = Some("call back".to_string());
    local.arrangements.push(older);

    let mut remote = Snapshot::new();
    let mut newer = Arrangement::new("arr-1", "a", at(9, 0, 0));
    newer.status = ArrangementStatus::Completed;
    remote.arrangements.push(newer.clone());
    remote
        .arrangements
        .push(Arrangement::new("arr-2", "b", at(7, 0, 0)));

    let outcome = merge_with_report(&local, &remote);
    assert_eq!(outcome.snapshot.arrangements.len(), 2);
    assert_eq!(outcome.snapshot.arrangement("arr-1"), Some(&newer));
    assert_eq!(outcome.report.arrangements_from_remote, 1);

    let reversed = merge(&remote, &local);
    assert_eq!(reversed.arrangement("arr-1"), Some(&newer));
}

#[test]
fn ended_day_session_beats_open_one() {
    let mut local = Snapshot::new();
    local.day_sessions.push(DaySession::started(day(), at(7, 0, 0)));

    let mut remote = Snapshot::new();
    let mut ended = DaySession::started(day(), at(7, 30, 0));
    ended.end = Some(at(17, 0, 0));
    remote.day_sessions.push(ended.clone());

    assert_eq!(merge(&local, &remote).day_session(day()), Some(&ended));
    assert_eq!(merge(&remote, &local).day_session(day()), Some(&ended));
}

#[test]
fn later_end_time_wins() {
    let mut early = DaySession::started(day(), at(7, 0, 0));
    early.end = Some(at(16, 0, 0));
    let mut late = DaySession::started(day(), at(7, 0, 0));
    late.end = Some(at(18, 0, 0));

    let mut local = Snapshot::new();
    local.day_sessions.push(late.clone());
    let mut remote = Snapshot::new();
    remote.day_sessions.push(early);

    assert_eq!(merge(&local, &remote).day_session(day()), Some(&late));
}

#[test]
fn active_index_prefers_remote_then_local() {
    let mut local = list(&["a", "b"], 1);
    local.active_index = Some(0);
    local.active_start_time = Some(at(9, 0, 0));
    let mut remote = list(&["a", "b"], 1);

    let merged = merge(&local, &remote);
    assert_eq!(merged.active_index, Some(0));
    assert_eq!(merged.active_start_time, Some(at(9, 0, 0)));

    remote.active_index = Some(1);
    remote.active_start_time = Some(at(9, 30, 0));
    let merged = merge(&local, &remote);
    assert_eq!(merged.active_index, Some(1));
    assert_eq!(merged.active_start_time, Some(at(9, 30, 0)));

    let merged = merge(&list(&["a"], 1), &list(&["a"], 1));
    assert_eq!(merged.active_index, None);
}

// --- protection ---

#[test]
fn protection_flag_vetoes_remote_application() {
    let clock = FakeClock::new();
    let mut registry = ProtectionRegistry::default();
    registry.acquire(ProtectionFlag::BulkImport, clock.now());

    let local = list(&["mine"], 2);
    let remote = list(&["theirs", "more"], 9);

    let decision = guarded_merge(&local, &remote, &registry, clock.now());
    assert_eq!(
        decision,
        MergeDecision::Deferred {
            flag: ProtectionFlag::BulkImport
        }
    );
    assert_eq!(decision.into_snapshot(&local), local);

    clock.advance(Duration::from_secs(3));
    let decision = guarded_merge(&local, &remote, &registry, clock.now());
    assert!(!decision.is_deferred());
    assert_eq!(decision.into_snapshot(&local).current_list_version, 9);
}

// --- properties ---

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::PaidInFull),
        Just(Outcome::DoorstepAbsent),
        Just(Outcome::Done),
        Just(Outcome::Arrangement),
    ]
}

fn arb_time() -> impl Strategy<Value = Timestamp> {
    (0i64..7_200).prop_map(|secs| at(8, 0, 0) + chrono::Duration::seconds(secs))
}

fn arb_completion() -> impl Strategy<Value = Completion> {
    (
        0usize..4,
        arb_outcome(),
        arb_time(),
        prop::option::of(1u64..4),
    )
        .prop_map(|(index, outcome, timestamp, version)| {
            let mut c = Completion::new(index, format!("{index} High St"), outcome, timestamp, 0);
            c.list_version = version;
            c
        })
}

fn arb_ledger_entry() -> impl Strategy<Value = LedgerEntry> {
    (arb_time(), 1u64..4, 0usize..4, any::<bool>()).prop_map(|(at, list_version, index, undone)| {
        LedgerEntry {
            at,
            list_version,
            index,
            action: if undone {
                LedgerAction::Undone
            } else {
                LedgerAction::Completed
            },
            outcome: None,
        }
    })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        prop::collection::vec("[a-z]{1,6}", 0..4),
        1u64..4,
        prop::collection::vec(arb_completion(), 0..6),
        prop::collection::vec(arb_ledger_entry(), 0..4),
        prop::collection::btree_map("arr-[0-3]", arb_time(), 0..3),
        prop::option::of(0usize..4),
    )
        .prop_map(
            |(names, version, completions, ledger, arrangements, active)| {
                let mut snapshot = Snapshot::with_addresses(
                    names.into_iter().map(Address::new).collect(),
                    version,
                );
                snapshot.completions = completions;
                snapshot.ledger = ledger;
                snapshot.arrangements = arrangements
                    .into_iter()
                    .map(|(id, updated)| Arrangement::new(id, "x", updated))
                    .collect();
                snapshot.active_index = active;
                snapshot.active_start_time = active.map(|_| at(8, 0, 0));
                snapshot
            },
        )
}

#[test]
fn merge_keeps_command_built_state_unchanged() {
    let clock = FakeClock::new();
    let mut snapshot = list(&["1 High St"], 1);
    let commands = [
        Command::UpsertArrangement {
            arrangement: Arrangement::new("b", "1 High St", at(8, 0, 0)),
        },
        Command::UpsertArrangement {
            arrangement: Arrangement::new("a", "1 High St", at(8, 0, 0)),
        },
        Command::StartDay {
            date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
        },
        Command::StartDay {
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        },
    ];
    for command in &commands {
        clock.advance(Duration::from_secs(1));
        snapshot = command.apply(&snapshot, clock.now()).unwrap();
    }

    let ids: Vec<&str> = snapshot.arrangements.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(merge(&snapshot, &snapshot), snapshot);
}

fn arb_command() -> impl Strategy<Value = Command> {
    let outcome = prop_oneof![
        Just(Outcome::PaidInFull),
        Just(Outcome::DoorstepAbsent),
        Just(Outcome::Done),
        Just(Outcome::Arrangement),
    ];
    prop_oneof![
        (0usize..3, outcome).prop_map(|(index, outcome)| Command::Complete {
            index,
            outcome,
            amount: None,
            arrangement_id: None,
            case_reference: None,
        }),
        (0usize..3).prop_map(|index| Command::Undo { index }),
        (0usize..3).prop_map(|index| Command::SetActive { index }),
        Just(Command::ClearActive),
        prop::collection::vec("[a-z]{1,6}", 0..3).prop_map(|names| Command::ReplaceAddresses {
            addresses: names.into_iter().map(Address::new).collect(),
        }),
        "arr-[0-3]".prop_map(|id| Command::UpsertArrangement {
            arrangement: Arrangement::new(id, "x", at(8, 0, 0)),
        }),
        "arr-[0-3]".prop_map(|id| Command::CancelArrangement { id }),
        (10u32..14).prop_map(|d| Command::StartDay {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
        }),
        (10u32..14).prop_map(|d| Command::EndDay {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
        }),
    ]
}

/// Snapshot reached by applying commands one second apart, skipping rejected ones
fn arb_command_built() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec(arb_command(), 0..16).prop_map(|commands| {
        let clock = FakeClock::new();
        let mut snapshot = list(&["1 High St", "2 High St", "3 High St"], 1);
        for command in commands {
            clock.advance(Duration::from_secs(1));
            if let Ok(next) = command.apply(&snapshot, clock.now()) {
                snapshot = next;
            }
        }
        snapshot
    })
}

proptest! {
    #[test]
    fn merge_is_idempotent_on_command_built_state(s in arb_command_built()) {
        prop_assert_eq!(merge(&s, &s), s);
    }

    #[test]
    fn merge_is_idempotent_on_merged_state(a in arb_snapshot(), b in arb_snapshot()) {
        let merged = merge(&a, &b);
        prop_assert_eq!(merge(&merged, &merged), merged);
    }

    #[test]
    fn list_version_never_regresses(a in arb_snapshot(), b in arb_snapshot()) {
        let merged = merge(&a, &b);
        prop_assert!(merged.current_list_version >= a.current_list_version);
        prop_assert!(merged.current_list_version >= b.current_list_version);
    }

    #[test]
    fn at_most_one_completion_per_slot(a in arb_snapshot(), b in arb_snapshot()) {
        let merged = merge(&a, &b);
        let mut slots = std::collections::BTreeSet::new();
        for completion in &merged.completions {
            prop_assert!(completion.list_version.is_some());
            prop_assert!(slots.insert((completion.list_version, completion.index)));
        }
    }

    #[test]
    fn merged_completions_survive_stale_replay(a in arb_snapshot(), b in arb_snapshot()) {
        let merged = merge(&a, &b);
        let replayed = merge(&merged, &a);
        prop_assert_eq!(replayed.completions, merged.completions);
    }
}
