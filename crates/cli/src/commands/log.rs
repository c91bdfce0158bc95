// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use syncsh_core::{Database, HistoryEntry, ListFilter};

use crate::cli::OutputFormat;
use crate::error::Result;

use super::{load, open_db};

pub fn run(
    machine: Option<String>,
    since: Option<i64>,
    limit: usize,
    output: OutputFormat,
) -> Result<()> {
    let (config, _) = load()?;
    let db = open_db(&config)?;
    let entries = run_impl(&db, machine, since, limit)?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No entries");
            }
            for entry in &entries {
                println!("{}", format_entry(entry, &Local));
            }
        }
    }
    Ok(())
}

/// Internal implementation that accepts db for testing.
pub(crate) fn run_impl(
    db: &Database,
    machine: Option<String>,
    since: Option<i64>,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    let mut filter = ListFilter::new().limit(limit);
    if let Some(machine) = machine {
        filter = filter.machine(machine);
    }
    if let Some(since) = since {
        filter = filter.since(since);
    }
    Ok(db.scope().list(&filter)?)
}

/// One line per entry: time, machine, command.
pub(crate) fn format_entry<Tz>(entry: &HistoryEntry, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = DateTime::from_timestamp(entry.timestamp, 0)
        .map(|t| t.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| entry.timestamp.to_string());
    format!("{time}  {:<12}  {}", entry.machine_id, entry.command)
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
