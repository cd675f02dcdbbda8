//! Offline merge specs

use crate::prelude::*;

#[test]
fn later_completion_wins_the_slot() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let merged = temp
        .canvass()
        .args(&["merge", "local.json", "remote.json"])
        .passes()
        .json();

    let completions = merged["completions"].as_array().unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0]["timestamp"], "2024-03-10T08:07:21Z");
    assert_eq!(completions[0]["listVersion"], 6);
    assert_eq!(merged["currentListVersion"], 6);
}

#[test]
fn merge_order_does_not_matter() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let forward = temp
        .canvass()
        .args(&["merge", "local.json", "remote.json"])
        .passes()
        .json();
    let backward = temp
        .canvass()
        .args(&["merge", "remote.json", "local.json"])
        .passes()
        .json();

    assert_eq!(forward["completions"], backward["completions"]);
}

#[test]
fn report_in_text_mode_goes_to_stderr() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let run = temp
        .canvass()
        .args(&["merge", "local.json", "remote.json", "--report"])
        .passes()
        .stderr_has("superseded completions:   1");
    run.json();
}

#[test]
fn report_in_json_mode_is_embedded() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let out = temp
        .canvass()
        .args(&["--format", "json", "merge", "local.json", "remote.json", "--report"])
        .passes()
        .json();

    assert_eq!(out["report"]["superseded_completions"], 1);
    assert_eq!(out["snapshot"]["completions"].as_array().unwrap().len(), 1);
}

#[test]
fn empty_remote_list_does_not_erase_local_addresses() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", r#"{"addresses": [], "currentListVersion": 9}"#);

    let merged = temp
        .canvass()
        .args(&["merge", "local.json", "remote.json"])
        .passes()
        .json();

    assert_eq!(merged["addresses"].as_array().unwrap().len(), 2);
    assert!(merged["currentListVersion"].as_u64().unwrap() >= 9);
}
