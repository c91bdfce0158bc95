// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! History entries and their content hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash of one logical command.
///
/// SHA-256 over the decimal timestamp, the machine id and the command text,
/// concatenated in that order, as lowercase hex. Both peers compute it
/// independently, so the format must never change.
pub fn compute_hash(timestamp: i64, machine_id: &str, command: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(machine_id.as_bytes());
    hasher.update(command.as_bytes());
    hex::encode(hasher.finalize())
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local row id. Never sent to peers.
    #[serde(skip)]
    pub id: Option<i64>,
    /// Seconds since the epoch when the command ran.
    pub timestamp: i64,
    pub machine_id: String,
    pub command: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub exit_code: i64,
    /// Empty until computed by [`HistoryEntry::ensure_hash`] or the store.
    #[serde(default)]
    pub hash: String,
}

impl HistoryEntry {
    /// A new entry with its hash filled in.
    pub fn new(timestamp: i64, machine_id: impl Into<String>, command: impl Into<String>) -> Self {
        let mut entry = HistoryEntry {
            id: None,
            timestamp,
            machine_id: machine_id.into(),
            command: command.into(),
            duration: 0,
            exit_code: 0,
            hash: String::new(),
        };
        entry.ensure_hash();
        entry
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn expected_hash(&self) -> String {
        compute_hash(self.timestamp, &self.machine_id, &self.command)
    }

    /// Fill in the hash if absent.
    pub fn ensure_hash(&mut self) {
        if self.hash.is_empty() {
            self.hash = self.expected_hash();
        }
    }

    /// True if the stored hash matches the entry's content.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.expected_hash()
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
