// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use syncsh_core::Database;

use crate::error::Result;

use super::{load, open_db};

pub fn run(hash: &str) -> Result<()> {
    let (config, _) = load()?;
    let db = open_db(&config)?;
    run_impl(&db, hash)?;
    println!("Forgot {hash}");
    Ok(())
}

/// Internal implementation that accepts db for testing.
pub(crate) fn run_impl(db: &Database, hash: &str) -> Result<()> {
    Ok(db.scope().delete_by_hash(hash.trim())?)
}

#[cfg(test)]
#[path = "forget_tests.rs"]
mod tests;
