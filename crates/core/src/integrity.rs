// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integrity verification
//!
//! Checksums are SHA-256 over a canonical JSON rendering: object keys sorted,
//! `null` members dropped, integral floats written as integers. Two snapshots
//! that differ only by re-serialization noise hash identically.
//!
//! The [`IntegrityMonitor`] turns read-back comparisons into verdicts. A single
//! mismatch is a soft warning; only a streak of consecutive mismatches inside
//! the window escalates to a forced resync.

use crate::snapshot::{Snapshot, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::Duration;

/// Content digest of a snapshot, rendered as `sha256:<hex>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub String);

impl Checksum {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a JSON value canonically
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                out.push_str(&(f as i64).to_string())
            }
            _ => out.push_str(&n.to_string()),
        },
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// Digest arbitrary JSON
pub fn checksum_value(value: &Value) -> Checksum {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    Checksum(format!("sha256:{:x}", digest))
}

/// Canonical checksum of a snapshot
pub fn checksum(snapshot: &Snapshot) -> Checksum {
    // Snapshot only holds strings, integers, floats, timestamps and JSON
    // values, all of which serialize; a failure degrades to hashing `null`.
    let value = serde_json::to_value(snapshot).unwrap_or(Value::Null);
    checksum_value(&value)
}

/// An incoming payload identical to what this device last pushed
pub fn is_echo(incoming: &Checksum, last_pushed: Option<&Checksum>) -> bool {
    last_pushed == Some(incoming)
}

/// Outcome of comparing a written snapshot with what was read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Match,
    /// Logged, not acted on
    SoftMismatch { consecutive: u32 },
    /// Streak reached the threshold; caller forces a full resync
    Escalate { consecutive: u32 },
}

/// Tracks consecutive read-back mismatches within a bounded window
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    threshold: u32,
    window: Duration,
    streak: VecDeque<Timestamp>,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(300))
    }
}

impl IntegrityMonitor {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            streak: VecDeque::new(),
        }
    }

    /// Current number of consecutive mismatches inside the window
    pub fn consecutive(&self) -> u32 {
        self.streak.len() as u32
    }

    pub fn reset(&mut self) {
        self.streak.clear();
    }

    /// Record one comparison
    pub fn record(
        &mut self,
        expected: &Checksum,
        actual: &Checksum,
        now: Timestamp,
    ) -> Verification {
        if expected == actual {
            self.streak.clear();
            return Verification::Match;
        }

        while let Some(first) = self.streak.front() {
            if crate::clock::elapsed_between(*first, now) > self.window {
                self.streak.pop_front();
            } else {
                break;
            }
        }
        self.streak.push_back(now);

        let consecutive = self.consecutive();
        if consecutive >= self.threshold {
            tracing::warn!(
                consecutive,
                %expected,
                %actual,
                "integrity mismatch threshold reached"
            );
            self.streak.clear();
            Verification::Escalate { consecutive }
        } else {
            tracing::warn!(consecutive, %expected, %actual, "integrity mismatch after write");
            Verification::SoftMismatch { consecutive }
        }
    }
}

#[cfg(test)]
#[path = "integrity_tests.rs"]
mod tests;
