// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared argument structs for CLI commands.
//!
//! These structs are used with `#[command(flatten)]` to reduce duplication
//! across commands that share common patterns.

use clap::Args;

/// Default number of entries shown by `syncsh log`.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Limit arguments for paginated results.
#[derive(Args, Clone, Debug, Default)]
pub struct LimitArgs {
    /// Maximum number of results (default 100)
    #[arg(short = 'n', long, conflicts_with = "no_limit")]
    pub limit: Option<usize>,

    /// Show every matching entry
    #[arg(long, conflicts_with = "limit")]
    pub no_limit: bool,
}

impl LimitArgs {
    /// Effective store limit; 0 means unbounded.
    pub fn resolve(&self) -> usize {
        if self.no_limit {
            0
        } else {
            self.limit.unwrap_or(DEFAULT_LOG_LIMIT)
        }
    }
}
