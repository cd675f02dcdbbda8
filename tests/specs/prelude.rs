//! Shared helpers for CLI specs

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway directory holding snapshot files and a state directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory passed as `--state-dir`
    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Write a file relative to the project root, creating parent directories
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write a file into the state directory
    pub fn state_file(&self, name: &str, content: &str) -> PathBuf {
        self.file(&format!("state/{}", name), content)
    }

    pub fn canvass(&self) -> CliBuilder {
        CliBuilder {
            cmd: {
                let mut cmd = Command::cargo_bin("canvass").unwrap();
                cmd.current_dir(self.dir.path())
                    .env_remove("CANVASS_LOG")
                    .arg("--state-dir")
                    .arg(self.state_dir());
                cmd
            },
        }
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> RunAssert {
        RunAssert(self.cmd.assert().success())
    }

    pub fn fails(mut self) -> RunAssert {
        RunAssert(self.cmd.assert().failure())
    }
}

pub struct RunAssert(assert_cmd::assert::Assert);

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.0.get_output().stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.0.get_output().stderr).to_string()
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout().as_str(), expected);
        self
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        Self(self.0.stdout(predicate::str::contains(needle)))
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        Self(self.0.stdout(predicate::str::contains(needle).not()))
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        Self(self.0.stderr(predicate::str::contains(needle)))
    }

    /// Parse stdout as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap()
    }
}

/// Snapshot with two addresses at list version 6 and one completion
pub const SNAPSHOT_LOCAL: &str = r#"{
  "addresses": [{"address": "1 Quay St"}, {"address": "2 Quay St"}],
  "completions": [
    {"index": 0, "address": "1 Quay St", "outcome": "PIF",
     "timestamp": "2024-03-10T08:05:00Z", "listVersion": 6}
  ],
  "currentListVersion": 6
}"#;

/// Same slot completed later on another device
pub const SNAPSHOT_REMOTE: &str = r#"{
  "addresses": [{"address": "1 Quay St"}, {"address": "2 Quay St"}],
  "completions": [
    {"index": 0, "address": "1 Quay St", "outcome": "PIF",
     "timestamp": "2024-03-10T08:07:21Z", "listVersion": 6}
  ],
  "currentListVersion": 6
}"#;
