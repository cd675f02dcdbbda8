//! Error reporting specs

use crate::prelude::*;

#[test]
fn unknown_command_fails() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["resync"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn missing_snapshot_file_is_named() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["checksum", "nowhere.json"])
        .fails()
        .stderr_has("failed to read")
        .stderr_has("nowhere.json");
}

#[test]
fn malformed_snapshot_is_rejected() {
    let temp = Project::empty();
    temp.file("broken.json", "{ not json");

    temp.canvass()
        .args(&["checksum", "broken.json"])
        .fails()
        .stderr_has("failed to parse");
}

#[test]
fn debug_logging_goes_to_stderr() {
    let temp = Project::empty();
    temp.file("local.json", SNAPSHOT_LOCAL);
    temp.file("remote.json", SNAPSHOT_REMOTE);

    let run = temp
        .canvass()
        .env("CANVASS_LOG", "debug")
        .args(&["--format", "json", "merge", "local.json", "remote.json"])
        .passes()
        .stderr_has("snapshots merged");
    run.json();
}
