// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration. Durations use humantime syntax (`"500ms"`, `"5m"`).
//!
//! ```toml
//! batch_size = 10
//! queue_capacity = 1000
//! tick_interval = "500ms"
//!
//! [retry]
//! max_attempts = 3
//! base_backoff = "1s"
//! max_backoff = "1m"
//!
//! [overlay]
//! fail_fast = "1s"
//! auto_confirm = "5s"
//!
//! [integrity]
//! mismatch_threshold = 3
//! window = "5m"
//!
//! [protection]
//! bulk_import = "2s"
//! restore = "30s"
//! ```

use crate::integrity::IntegrityMonitor;
use crate::protection::ProtectionPolicy;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Operations pushed per drain round
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Offline queue bound; overflow evicts the oldest entries
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(with = "humantime_serde", default = "default_tick_interval")]
    pub tick_interval: Duration,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub integrity: IntegrityConfig,
    #[serde(default)]
    pub protection: ProtectionPolicy,
}

fn default_batch_size() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(500)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
            tick_interval: default_tick_interval(),
            retry: RetryPolicy::default(),
            overlay: OverlayConfig::default(),
            integrity: IntegrityConfig::default(),
            protection: ProtectionPolicy::default(),
        }
    }
}

/// Optimistic overlay deadlines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Roll back an update that was not durably recorded by then
    #[serde(with = "humantime_serde", default = "default_fail_fast")]
    pub fail_fast: Duration,
    /// Presume success of a recorded update without an explicit signal
    #[serde(with = "humantime_serde", default = "default_auto_confirm")]
    pub auto_confirm: Duration,
}

fn default_fail_fast() -> Duration {
    Duration::from_secs(1)
}

fn default_auto_confirm() -> Duration {
    Duration::from_secs(5)
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            fail_fast: default_fail_fast(),
            auto_confirm: default_auto_confirm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityConfig {
    #[serde(default = "default_mismatch_threshold")]
    pub mismatch_threshold: u32,
    #[serde(with = "humantime_serde", default = "default_window")]
    pub window: Duration,
}

fn default_mismatch_threshold() -> u32 {
    3
}

fn default_window() -> Duration {
    Duration::from_secs(300)
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            mismatch_threshold: default_mismatch_threshold(),
            window: default_window(),
        }
    }
}

impl IntegrityConfig {
    pub fn monitor(&self) -> IntegrityMonitor {
        IntegrityMonitor::new(self.mismatch_threshold, self.window)
    }
}

impl SyncConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_backoff > self.retry.max_backoff {
            return Err(ConfigError::Invalid(
                "retry.base_backoff exceeds retry.max_backoff".into(),
            ));
        }
        if self.overlay.fail_fast >= self.overlay.auto_confirm {
            return Err(ConfigError::Invalid(
                "overlay.fail_fast must be shorter than overlay.auto_confirm".into(),
            ));
        }
        if self.integrity.mismatch_threshold == 0 {
            return Err(ConfigError::Invalid(
                "integrity.mismatch_threshold must be at least 1".into(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
