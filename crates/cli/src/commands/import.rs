// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use syncsh_core::Database;

use crate::config::Config;
use crate::error::Result;
use crate::ingest::{ingest_file, IngestReport};

use super::{load, open_db};

pub fn run() -> Result<()> {
    let (config, _) = load()?;
    let mut db = open_db(&config)?;
    let report = run_impl(&mut db, &config)?;
    println!(
        "Imported {} new entries from {} ({} already recorded)",
        report.inserted,
        config.history_path.display(),
        report.duplicates()
    );
    Ok(())
}

/// Internal implementation that accepts db for testing.
pub(crate) fn run_impl(db: &mut Database, config: &Config) -> Result<IngestReport> {
    Ok(ingest_file(
        db,
        config.shell,
        &config.history_path,
        &config.machine_id,
    )?)
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
