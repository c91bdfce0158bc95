// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

/// All possible errors that can occur in the syncsh CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: no config at {0}\n  hint: run 'syncsh init' first")]
    NotInitialized(PathBuf),

    #[error("already initialized at {0}\n  hint: remove the config file to start over")]
    AlreadyInitialized(PathBuf),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid shell: '{0}'\n  hint: valid shells are: bash, zsh, fish")]
    InvalidShell(String),

    #[error("invalid history path {}: {reason}", path.display())]
    InvalidHistoryPath { path: PathBuf, reason: String },

    #[error("no peer configured\n  hint: run 'syncsh pair' with the other machine's endpoint and public key")]
    NoPeer,

    #[error("cannot watch {}: {reason}", path.display())]
    Watch { path: PathBuf, reason: String },

    #[error("cannot provision interface {interface}: {reason}")]
    Provision { interface: String, reason: String },

    #[error("sync server stopped: {0}\n  hint: run 'syncsh connect' again")]
    ServerStopped(String),

    #[error(transparent)]
    Core(#[from] syncsh_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for syncsh operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
