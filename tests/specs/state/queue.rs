//! Offline queue specs

use crate::prelude::*;

const QUEUE: &str = r#"{
  "items": [
    {
      "operation": {
        "id": "op-7",
        "sequence": 7,
        "type": "set_active",
        "payload": {"type": "set_active", "index": 1},
        "clientId": "dev-1",
        "timestamp": "2024-03-10T08:00:00Z"
      },
      "dedupKey": "set_active:1",
      "enqueuedAt": "2024-03-10T08:00:00Z",
      "attempts": 2,
      "lastError": "transient network error: timeout",
      "notBefore": "2024-03-10T08:00:04Z"
    }
  ]
}"#;

#[test]
fn empty_queue() {
    let temp = Project::empty();

    temp.canvass()
        .args(&["queue", "show"])
        .passes()
        .stdout_eq("No queued operations\n");
}

#[test]
fn queued_operation_is_listed() {
    let temp = Project::empty();
    temp.state_file("queue.json", QUEUE);

    temp.canvass()
        .args(&["queue", "show"])
        .passes()
        .stdout_has("op-7")
        .stdout_has("set_active")
        .stdout_has("transient network error: timeout");
}

#[test]
fn queue_json_carries_retry_state() {
    let temp = Project::empty();
    temp.state_file("queue.json", QUEUE);

    let out = temp
        .canvass()
        .args(&["--format", "json", "queue", "show"])
        .passes()
        .json();

    assert_eq!(out[0]["id"], "op-7");
    assert_eq!(out[0]["attempts"], 2);
    assert_eq!(out[0]["notBefore"], "2024-03-10T08:00:04Z");
}
