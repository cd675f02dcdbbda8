// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation log entry with checksum verification

use canvass_core::Operation;
use serde::{Deserialize, Serialize};

/// One line of the operation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub operation: Operation,
    /// CRC32 of the serialized operation
    pub checksum: u32,
}

impl LogEntry {
    pub fn new(operation: Operation) -> Self {
        let checksum = Self::calculate_checksum(&operation);
        Self {
            operation,
            checksum,
        }
    }

    fn calculate_checksum(operation: &Operation) -> u32 {
        // Operations hold only strings, integers, floats and timestamps, so
        // serialization does not fail; an empty string still fails `verify`.
        let json = serde_json::to_string(operation).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.operation)
    }

    pub fn sequence(&self) -> u64 {
        self.operation.sequence
    }

    /// Serialize to one line of JSON (no trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
