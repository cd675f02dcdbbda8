//! Help and version output specs

use crate::prelude::*;

#[test]
fn help_lists_every_command() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["--help"])
        .passes()
        .stdout_has("merge")
        .stdout_has("checksum")
        .stdout_has("log")
        .stdout_has("queue")
        .stdout_has("flags")
        .stdout_has("config");
}

#[test]
fn version_flag_prints_version() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["--version"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}

#[test]
fn log_help_lists_subcommands() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["log", "--help"])
        .passes()
        .stdout_has("stats")
        .stdout_has("unsynced")
        .stdout_has("repair");
}
