// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation log reader
//!
//! Iterates entries in file order. The first line that fails to parse or
//! verify marks the end of the usable log; everything after it is treated
//! as a torn write.

use crate::entry::LogEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogReadError {
    #[error("corrupted entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("sequence {sequence} at line {line} does not follow {previous}")]
    OutOfOrder {
        line: u64,
        sequence: u64,
        previous: u64,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reader over an operation log file; a missing file reads as empty
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<LogEntryIter, LogReadError> {
        LogEntryIter::new(&self.path)
    }

    /// All entries up to the first corrupt line
    pub fn valid_entries(&self) -> Result<Vec<LogEntry>, LogReadError> {
        Ok(self.validate()?.entries)
    }

    /// Scan the whole log, stopping at the first corrupt line
    pub fn validate(&self) -> Result<LogValidation, LogReadError> {
        let mut iter = self.entries()?;
        let mut entries = Vec::new();
        let mut corruption = None;

        while let Some(result) = iter.next() {
            match result {
                Ok(entry) => entries.push(entry),
                Err(LogReadError::Io(e)) => return Err(LogReadError::Io(e)),
                Err(e) => {
                    corruption = Some(LogCorruption {
                        line: e.line().unwrap_or(iter.line_number),
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(LogValidation {
            entries,
            valid_len: iter.last_valid_position(),
            corruption,
        })
    }
}

impl LogReadError {
    fn line(&self) -> Option<u64> {
        match self {
            LogReadError::Corrupted { line, .. }
            | LogReadError::ChecksumMismatch { line }
            | LogReadError::OutOfOrder { line, .. } => Some(*line),
            LogReadError::Io(_) => None,
        }
    }
}

/// Result of scanning a log file
#[derive(Debug)]
pub struct LogValidation {
    pub entries: Vec<LogEntry>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    pub corruption: Option<LogCorruption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCorruption {
    pub line: u64,
    pub reason: String,
}

/// Iterator over log entries with position tracking
pub struct LogEntryIter {
    reader: Option<BufReader<File>>,
    line_number: u64,
    previous_sequence: Option<u64>,
    /// Byte offset just past the last valid entry
    last_valid_position: u64,
    position: u64,
}

impl LogEntryIter {
    fn new(path: &Path) -> Result<Self, LogReadError> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            reader,
            line_number: 0,
            previous_sequence: None,
            last_valid_position: 0,
            position: 0,
        })
    }

    pub fn last_valid_position(&self) -> u64 {
        self.last_valid_position
    }
}

impl Iterator for LogEntryIter {
    type Item = Result<LogEntry, LogReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        loop {
            let mut line = String::new();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => n as u64,
                Err(e) => return Some(Err(LogReadError::Io(e))),
            };
            self.line_number += 1;
            self.position += bytes_read;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // A final line without its newline is a torn append
            if !line.ends_with('\n') {
                return Some(Err(LogReadError::Corrupted {
                    line: self.line_number,
                    reason: "missing line terminator".to_string(),
                }));
            }

            let entry = match LogEntry::from_line(trimmed) {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(LogReadError::Corrupted {
                        line: self.line_number,
                        reason: e.to_string(),
                    }))
                }
            };

            if !entry.verify() {
                return Some(Err(LogReadError::ChecksumMismatch {
                    line: self.line_number,
                }));
            }

            if let Some(previous) = self.previous_sequence {
                if entry.sequence() <= previous {
                    return Some(Err(LogReadError::OutOfOrder {
                        line: self.line_number,
                        sequence: entry.sequence(),
                        previous,
                    }));
                }
            }

            self.previous_sequence = Some(entry.sequence());
            self.last_valid_position = self.position;
            return Some(Ok(entry));
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
