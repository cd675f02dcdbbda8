// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy
//!
//! One policy decides, for every failed remote write, whether the operation
//! counts as done, stays queued, waits without spending an attempt, or is
//! dropped and its caller rejected.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an error is treated, independent of attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The write is known to have landed
    Succeeded,
    /// Worth another attempt after backoff
    Retry,
    /// Not a failure of the operation; wait without spending an attempt
    Defer,
    /// Retrying cannot help
    Terminal,
}

/// What to do with one operation after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Succeeded,
    Defer,
    Retry { after: Duration },
    /// Drop the operation and reject its caller with this error
    GiveUp(SyncError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "humantime_serde", default = "default_base_backoff")]
    pub base_backoff: Duration,
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    pub max_backoff: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff: default_base_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    pub fn classify(error: &SyncError) -> Disposition {
        match error {
            SyncError::DuplicateWrite => Disposition::Succeeded,
            SyncError::TransientNetwork(_) | SyncError::IntegrityMismatch { .. } => {
                Disposition::Retry
            }
            SyncError::AuthRequired | SyncError::ProtectionActive(_) => Disposition::Defer,
            SyncError::RetryBudgetExceeded { .. }
            | SyncError::QueueOverflow { .. }
            | SyncError::Rejected(_)
            | SyncError::Cancelled(_)
            | SyncError::NotRecorded
            | SyncError::Command(_) => Disposition::Terminal,
        }
    }

    /// Decide after a failure; `attempts` already counts the failed attempt
    pub fn decide(&self, attempts: u32, error: &SyncError) -> RetryDecision {
        match Self::classify(error) {
            Disposition::Succeeded => RetryDecision::Succeeded,
            Disposition::Defer => RetryDecision::Defer,
            Disposition::Terminal => RetryDecision::GiveUp(error.clone()),
            Disposition::Retry if attempts >= self.max_attempts => {
                RetryDecision::GiveUp(SyncError::RetryBudgetExceeded {
                    attempts,
                    last_error: error.to_string(),
                })
            }
            Disposition::Retry => RetryDecision::Retry {
                after: self.backoff(attempts),
            },
        }
    }

    /// Exponential backoff: `base * 2^(attempts - 1)`, capped at `max_backoff`
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
