// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations recorded in the operation log and carried by the offline queue

use crate::command::{Command, CommandKind, EntityRef};
use crate::id::{DeviceId, OperationId};
use crate::integrity::checksum_value;
use crate::snapshot::Timestamp;
use serde::{Deserialize, Serialize};

/// One local mutation, immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    /// Per-device, strictly increasing, never reused
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub payload: Command,
    pub client_id: DeviceId,
    pub timestamp: Timestamp,
}

impl Operation {
    pub fn new(
        id: OperationId,
        sequence: u64,
        payload: Command,
        client_id: DeviceId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            sequence,
            kind: payload.kind(),
            payload,
            client_id,
            timestamp,
        }
    }

    pub fn entity(&self) -> EntityRef {
        self.payload.entity()
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::for_command(&self.payload)
    }
}

/// Identity of an operation for offline dedup: `(type, entity, entityId, payload)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(pub String);

impl DedupKey {
    pub fn for_command(command: &Command) -> Self {
        let entity = command.entity();
        let payload = serde_json::to_value(command).unwrap_or(serde_json::Value::Null);
        let key = serde_json::json!({
            "type": command.kind(),
            "entity": entity.kind,
            "entityId": entity.id,
            "payload": checksum_value(&payload),
        });
        DedupKey(checksum_value(&key).0)
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
