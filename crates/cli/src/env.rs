// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables used by the CLI are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `SYNCSH_HOME` if set and non-empty.
pub fn syncsh_home() -> Option<PathBuf> {
    non_empty(vars::SYNCSH_HOME).map(PathBuf::from)
}

/// Returns the value of `SYNCSH_WG_DAEMON` if set and non-empty.
pub fn wg_daemon() -> Option<PathBuf> {
    non_empty(vars::SYNCSH_WG_DAEMON).map(PathBuf::from)
}

/// Returns the login shell from `SHELL`.
pub fn login_shell() -> Option<String> {
    non_empty(vars::SHELL)
}

/// Returns zsh's `HISTFILE` if exported.
pub fn histfile() -> Option<PathBuf> {
    non_empty(vars::HISTFILE).map(PathBuf::from)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
