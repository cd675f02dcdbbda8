//! Checksum specs

use crate::prelude::*;

#[test]
fn checksum_ignores_key_order() {
    let temp = Project::empty();
    temp.file("a.json", r#"{"currentListVersion": 2, "addresses": [{"address": "1 Quay St"}]}"#);
    temp.file("b.json", r#"{"addresses": [{"address": "1 Quay St"}], "currentListVersion": 2}"#);

    let a = temp.canvass().args(&["checksum", "a.json"]).passes().stdout();
    let b = temp.canvass().args(&["checksum", "b.json"]).passes().stdout();

    assert!(a.starts_with("sha256:"), "{}", a);
    assert_eq!(a, b);
}

#[test]
fn checksum_changes_with_content() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let local = temp.canvass().args(&["checksum", "local.json"]).passes().stdout();
    let remote = temp.canvass().args(&["checksum", "remote.json"]).passes().stdout();

    assert_ne!(local, remote);
}

#[test]
fn checksum_json_includes_counts() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);

    let out = temp
        .canvass()
        .args(&["--format", "json", "checksum", "local.json"])
        .passes()
        .json();

    assert_eq!(out["addresses"], 2);
    assert_eq!(out["completions"], 1);
    assert!(out["checksum"].as_str().unwrap().starts_with("sha256:"));
}
