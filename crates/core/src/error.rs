// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for syncsh-core operations.

use thiserror::Error;

/// All possible errors that can occur in syncsh-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid link configuration: {field} {reason}")]
    ConfigInvalid { field: &'static str, reason: String },

    #[error("invalid endpoint '{0}'\n  hint: expected <ip>:<port>, e.g. 203.0.113.7:51820")]
    InvalidEndpoint(String),

    #[error("invalid {key}: {reason}\n  hint: keys are 32 bytes, base64-encoded (44 characters)")]
    KeyParse { key: &'static str, reason: String },

    #[error("tunnel engine error: {0}")]
    Engine(String),

    #[error("tunnel is not connected")]
    NotConnected,

    #[error("entry already recorded: {0}")]
    DuplicateHash(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// True for the soft "already recorded" outcome of an idempotent insert.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateHash(_))
    }

    /// True when a lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// A specialized Result type for syncsh-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
