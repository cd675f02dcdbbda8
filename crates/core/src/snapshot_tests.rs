// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn at(h: u32, m: u32, s: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
}

#[test]
fn snapshot_deserializes_camel_case_document() {
    let json = r#"{
        "addresses": [{"address": "1 High St", "lat": 51.5, "postcode": "AB1 2CD"}],
        "completions": [{
            "index": 0,
            "address": "1 High St",
            "outcome": "PIF",
            "timestamp": "2024-03-10T08:07:21.000Z",
            "listVersion": 6,
            "amount": "120.00"
        }],
        "arrangements": [],
        "daySessions": [{"date": "2024-03-10", "start": "2024-03-10T07:30:00Z"}],
        "currentListVersion": 6,
        "activeIndex": null
    }"#;

    let snapshot: Snapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.current_list_version, 6);
    assert_eq!(snapshot.addresses[0].lat, Some(51.5));
    assert_eq!(
        snapshot.addresses[0].extra.get("postcode"),
        Some(&serde_json::json!("AB1 2CD"))
    );
    assert_eq!(snapshot.completions[0].outcome, Outcome::PaidInFull);
    assert_eq!(snapshot.completions[0].list_version, Some(6));
    assert_eq!(snapshot.completions[0].timestamp, at(8, 7, 21));
    assert!(snapshot.day_sessions[0].end.is_none());
    assert!(snapshot.ledger.is_empty());
}

#[test]
fn unknown_address_fields_survive_roundtrip() {
    let json = r#"{"address": "2 Low Rd", "notes": "dog", "priority": 3}"#;
    let address: Address = serde_json::from_str(json).unwrap();
    let back = serde_json::to_value(&address).unwrap();
    assert_eq!(back["notes"], "dog");
    assert_eq!(back["priority"], 3);
}

#[test]
fn visible_completion_ignores_other_list_versions() {
    let mut snapshot = Snapshot::with_addresses(vec![Address::new("a"), Address::new("b")], 2);
    snapshot
        .completions
        .push(Completion::new(0, "a", Outcome::Done, at(8, 0, 0), 1));
    assert!(snapshot.visible_completion(0).is_none());

    snapshot
        .completions
        .push(Completion::new(0, "a", Outcome::DoorstepAbsent, at(9, 0, 0), 2));
    assert_eq!(
        snapshot.visible_completion(0).map(|c| c.outcome),
        Some(Outcome::DoorstepAbsent)
    );
    assert_eq!(snapshot.completed_count(), 1);
}

#[test]
fn ledger_status_reports_latest_action() {
    let mut snapshot = Snapshot::with_addresses(vec![Address::new("a")], 1);
    snapshot.ledger.push(LedgerEntry {
        at: at(8, 0, 0),
        list_version: 1,
        index: 0,
        action: LedgerAction::Completed,
        outcome: Some(Outcome::Done),
    });
    snapshot.ledger.push(LedgerEntry {
        at: at(8, 5, 0),
        list_version: 1,
        index: 0,
        action: LedgerAction::Undone,
        outcome: None,
    });
    assert_eq!(snapshot.ledger_status(0), Some(LedgerAction::Undone));
    assert_eq!(snapshot.ledger_status(1), None);
}

#[test]
fn normalized_orders_collections_and_backfills_versions() {
    let mut snapshot = Snapshot::with_addresses(vec![Address::new("a"), Address::new("b")], 4);
    let mut legacy = Completion::new(1, "b", Outcome::Done, at(7, 0, 0), 0);
    legacy.list_version = None;
    snapshot.completions.push(legacy);
    snapshot
        .completions
        .push(Completion::new(0, "a", Outcome::Done, at(9, 0, 0), 4));
    snapshot
        .arrangements
        .push(Arrangement::new("z", "a", at(9, 0, 0)));
    snapshot
        .arrangements
        .push(Arrangement::new("b", "b", at(9, 0, 0)));

    let normalized = snapshot.normalized();
    assert_eq!(normalized.completions[0].index, 0);
    assert_eq!(normalized.completions[1].list_version, Some(4));
    assert_eq!(normalized.arrangements[0].id, "b");
    assert_eq!(normalized.clone().normalized(), normalized);
}

#[test]
fn outcome_serializes_with_short_codes() {
    assert_eq!(serde_json::to_string(&Outcome::PaidInFull).unwrap(), "\"PIF\"");
    assert_eq!(serde_json::to_string(&Outcome::Arrangement).unwrap(), "\"ARR\"");
    assert_eq!(Outcome::DoorstepAbsent.to_string(), "DA");
}
