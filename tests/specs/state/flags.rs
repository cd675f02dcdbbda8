//! Protection flag specs

use crate::prelude::*;

#[test]
fn no_flags() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["flags", "show"])
        .passes()
        .stdout_eq("No protection flags\n");
}

#[test]
fn stale_flags_show_as_expired_and_timing_holds() {
    let temp = Project::empty();
    temp.state_file(
        "flags.json",
        r#"{"bulk_import": "2024-03-10T08:00:00Z", "active_timing": "2024-03-10T08:00:00Z"}"#,
    );

    let out = temp
        .canvass()
        .args(&["--format", "json", "flags", "show"])
        .passes()
        .json();

    let flags = out.as_array().unwrap();
    assert_eq!(flags.len(), 2);
    let bulk = flags.iter().find(|f| f["flag"] == "bulk_import").unwrap();
    assert_eq!(bulk["active"], false);
    assert_eq!(bulk["expiresAt"], "2024-03-10T08:00:02Z");
    let timing = flags.iter().find(|f| f["flag"] == "active_timing").unwrap();
    assert_eq!(timing["active"], true);
    assert!(timing["expiresAt"].is_null());
}

#[test]
fn ttl_comes_from_the_config_file() {
    let temp = Project::empty();
    temp.state_file("flags.json", r#"{"restore": "2024-03-10T08:00:00Z"}"#);
    temp.file("sync.toml", "[protection]\nrestore = \"1h\"\n");

    let out = temp
        .canvass()
        .args(&["--config", "sync.toml", "--format", "json", "flags", "show"])
        .passes()
        .json();

    assert_eq!(out[0]["expiresAt"], "2024-03-10T09:00:00Z");
}

#[test]
fn text_output_marks_state() {
    let temp = Project::empty();
    temp.state_file("flags.json", r#"{"restore": "2024-03-10T08:00:00Z"}"#);

    temp.canvass()
        .args(&["flags", "show"])
        .passes()
        .stdout_has("restore")
        .stdout_has("expired");
}
