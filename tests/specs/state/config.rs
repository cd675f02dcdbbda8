//! Configuration specs

use crate::prelude::*;

#[test]
fn valid_config_prints_effective_values() {
    let temp = Project::empty();
    temp.file(
        "sync.toml",
        "batch_size = 25\n\n[retry]\nmax_attempts = 5\nbase_backoff = \"2s\"\n",
    );

    temp.canvass()
        .args(&["config", "check", "sync.toml"])
        .passes()
        .stdout_has("sync.toml: ok")
        .stdout_has("batch_size: 25")
        .stdout_has("retry: 5 attempts");
}

#[test]
fn empty_config_uses_defaults() {
    let temp = Project::empty();
    temp.file("sync.toml", "");

    let out = temp
        .canvass()
        .args(&["--format", "json", "config", "check", "sync.toml"])
        .passes()
        .json();

    assert_eq!(out["config"]["batch_size"], 10);
    assert_eq!(out["config"]["queue_capacity"], 1000);
    assert_eq!(out["config"]["integrity"]["mismatch_threshold"], 3);
}

#[test]
fn zero_batch_size_is_rejected() {
    let temp = Project::empty();
    temp.file("sync.toml", "batch_size = 0\n");

    temp.canvass()
        .args(&["config", "check", "sync.toml"])
        .fails()
        .stderr_has("batch_size must be at least 1");
}

#[test]
fn unknown_keys_are_rejected() {
    let temp = Project::empty();
    temp.file("sync.toml", "batch = 3\n");

    temp.canvass()
        .args(&["config", "check", "sync.toml"])
        .fails()
        .stderr_has("invalid TOML");
}

#[test]
fn fail_fast_must_precede_auto_confirm() {
    let temp = Project::empty();
    temp.file("sync.toml", "[overlay]\nfail_fast = \"10s\"\nauto_confirm = \"5s\"\n");

    temp.canvass()
        .args(&["config", "check", "sync.toml"])
        .fails()
        .stderr_has("invalid configuration");
}
