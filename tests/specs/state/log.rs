//! Operation log diagnostics specs

use crate::prelude::*;

#[test]
fn stats_on_a_fresh_directory() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["log", "stats"])
        .passes()
        .stdout_has("entries:        0")
        .stdout_has("log is intact");
}

#[test]
fn unsynced_on_a_fresh_directory() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["log", "unsynced"])
        .passes()
        .stdout_eq("No unsynced operations\n");
}

#[test]
fn unsynced_json_is_an_empty_list() {
    let temp = Project::empty();

    let out = temp
        .canvass()
        .args(&["--format", "json", "log", "unsynced"])
        .passes()
        .json();

    assert_eq!(out, serde_json::json!([]));
}

#[test]
fn corrupt_tail_is_reported_then_repaired() {
    let temp = Project::empty();
    temp.state_file("oplog.jsonl", "{ torn write");

    temp.canvass()
        .args(&["log", "stats"])
        .passes()
        .stdout_has("corrupt at line 1");

    temp.canvass()
        .args(&["log", "repair"])
        .passes()
        .stdout_has("Removed 12 bytes");

    temp.canvass()
        .args(&["log", "stats"])
        .passes()
        .stdout_has("log is intact");

    temp.canvass()
        .args(&["log", "repair"])
        .passes()
        .stdout_eq("Nothing to repair\n");
}
