// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed history store.
//!
//! Entries are content-addressed: the `hash` column is UNIQUE, and the
//! constraint is the only thing that arbitrates between concurrent writers
//! (the watcher ingesting local lines and a sync round ingesting a remote
//! batch may each hold their own connection). Every operation runs against a
//! [`Scope`], which is either the plain connection or an open transaction.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::entry::HistoryEntry;
use crate::error::{Error, Result};

/// SQL schema for the history database.
pub const SCHEMA: &str = r#"
-- Content-addressed command log
CREATE TABLE IF NOT EXISTS history_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    machine_id TEXT NOT NULL,
    command TEXT NOT NULL,
    duration INTEGER NOT NULL DEFAULT 0,
    exit_code INTEGER NOT NULL DEFAULT 0,
    hash TEXT NOT NULL UNIQUE
);

-- One cursor per remote machine
CREATE TABLE IF NOT EXISTS sync_state (
    machine_id TEXT PRIMARY KEY,
    last_sync_timestamp INTEGER NOT NULL DEFAULT 0
);

-- Bytes of each watched history file already ingested, with a digest of
-- those bytes to notice a file that was rewritten in place
CREATE TABLE IF NOT EXISTS watch_offsets (
    path TEXT PRIMARY KEY,
    byte_offset INTEGER NOT NULL,
    fingerprint TEXT NOT NULL DEFAULT ''
);

-- Untimed commands already taken from each history file, by command digest
CREATE TABLE IF NOT EXISTS watch_commands (
    path TEXT NOT NULL,
    digest TEXT NOT NULL,
    seen INTEGER NOT NULL,
    PRIMARY KEY (path, digest)
);

CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history_entries(timestamp);
CREATE INDEX IF NOT EXISTS idx_history_machine ON history_entries(machine_id, timestamp);
"#;

/// Create the schema on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        machine_id: row.get(2)?,
        command: row.get(3)?,
        duration: row.get(4)?,
        exit_code: row.get(5)?,
        hash: row.get(6)?,
    })
}

const ENTRY_COLUMNS: &str = "id, timestamp, machine_id, command, duration, exit_code, hash";

/// Filter for [`Scope::list`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub machine_id: Option<String>,
    /// Exclusive lower bound on `timestamp`. Zero or less means no bound.
    pub since: Option<i64>,
    /// Maximum rows to return. Zero means unbounded.
    pub limit: usize,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machine(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The sync cursor recorded for one remote machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncCursor {
    pub machine_id: String,
    pub last_sync_timestamp: i64,
}

/// How far a history file has been read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMark {
    /// Bytes already ingested.
    pub offset: u64,
    /// Hex SHA-256 of bytes `[0, offset)`; empty when `offset` is 0.
    pub fingerprint: String,
}

/// How [`Scope::record_file_commands`] folds new counts into stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenUpdate {
    /// Counts come from bytes appended since the last pass.
    Add,
    /// Counts come from a full re-read; keep the larger of old and new.
    Max,
}

/// SQLite database connection with history store operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the watcher, the server and a sync round share the file
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Operations outside any explicit transaction.
    pub fn scope(&self) -> Scope<'_> {
        Scope { conn: &self.conn }
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits if `f` returns `Ok`; rolls back otherwise, leaving the store
    /// exactly as it was.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&Scope<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&Scope { conn: &*tx })?;
        tx.commit()?;
        Ok(value)
    }
}

/// Store operations bound to a connection or transaction.
#[derive(Clone, Copy)]
pub struct Scope<'c> {
    conn: &'c Connection,
}

impl Scope<'_> {
    /// Insert an entry, computing its hash if absent.
    ///
    /// Returns [`Error::DuplicateHash`] when the entry is already recorded;
    /// callers treat that as success. On insert, `entry.id` is set.
    pub fn create_entry(&self, entry: &mut HistoryEntry) -> Result<()> {
        entry.ensure_hash();
        let inserted = self.conn.execute(
            "INSERT INTO history_entries (timestamp, machine_id, command, duration, exit_code, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.timestamp,
                entry.machine_id,
                entry.command,
                entry.duration,
                entry.exit_code,
                entry.hash,
            ],
        );
        match inserted {
            Ok(_) => {
                entry.id = Some(self.conn.last_insert_rowid());
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicateHash(entry.hash.clone())),
            Err(e) => Err(Error::Store(e)),
        }
    }

    /// Insert an entry, reporting whether it was new.
    pub fn record_entry(&self, entry: &mut HistoryEntry) -> Result<bool> {
        match self.create_entry(entry) {
            Ok(()) => Ok(true),
            Err(e) if e.is_duplicate() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn get_by_hash(&self, hash: &str) -> Result<HistoryEntry> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM history_entries WHERE hash = ?1"),
                params![hash],
                entry_from_row,
            )
            .optional()?;
        entry.ok_or_else(|| Error::NotFound(format!("entry {hash}")))
    }

    /// Entries matching `filter`, newest first.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<HistoryEntry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM history_entries WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(machine_id) = &filter.machine_id {
            sql.push_str(" AND machine_id = ?");
            args.push(Value::Text(machine_id.clone()));
        }
        if let Some(since) = filter.since.filter(|s| *s > 0) {
            sql.push_str(" AND timestamp > ?");
            args.push(Value::Integer(since));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");
        if filter.limit > 0 {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(i64::try_from(filter.limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(args), entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of entries, optionally for one machine.
    pub fn count(&self, machine_id: Option<&str>) -> Result<i64> {
        let count = match machine_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM history_entries WHERE machine_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM history_entries", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn delete_by_hash(&self, hash: &str) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM history_entries WHERE hash = ?1", params![hash])?;
        if affected == 0 {
            return Err(Error::NotFound(format!("entry {hash}")));
        }
        Ok(())
    }

    /// The cursor for `machine_id`; 0 if none has been recorded.
    pub fn get_cursor(&self, machine_id: &str) -> Result<i64> {
        let ts = self
            .conn
            .query_row(
                "SELECT last_sync_timestamp FROM sync_state WHERE machine_id = ?1",
                params![machine_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts.unwrap_or(0))
    }

    /// Replace the cursor for `machine_id`.
    pub fn set_cursor(&self, machine_id: &str, timestamp: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (machine_id, last_sync_timestamp) VALUES (?1, ?2)
             ON CONFLICT(machine_id) DO UPDATE SET last_sync_timestamp = excluded.last_sync_timestamp",
            params![machine_id, timestamp],
        )?;
        Ok(())
    }

    /// All recorded cursors, ordered by machine id.
    pub fn cursors(&self) -> Result<Vec<SyncCursor>> {
        let mut stmt = self.conn.prepare(
            "SELECT machine_id, last_sync_timestamp FROM sync_state ORDER BY machine_id",
        )?;
        let cursors = stmt
            .query_map([], |row| {
                Ok(SyncCursor {
                    machine_id: row.get(0)?,
                    last_sync_timestamp: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cursors)
    }

    /// The read position for `path`; offset 0 if never read.
    pub fn file_mark(&self, path: &str) -> Result<FileMark> {
        let mark: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT byte_offset, fingerprint FROM watch_offsets WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((offset, fingerprint)) = mark else {
            return Ok(FileMark::default());
        };
        let offset = u64::try_from(offset)
            .map_err(|_| Error::CorruptedData(format!("negative offset {offset} for {path}")))?;
        Ok(FileMark {
            offset,
            fingerprint,
        })
    }

    pub fn set_file_mark(&self, path: &str, mark: &FileMark) -> Result<()> {
        let offset = i64::try_from(mark.offset).map_err(|_| {
            Error::CorruptedData(format!("offset {} for {path} too large", mark.offset))
        })?;
        self.conn.execute(
            "INSERT INTO watch_offsets (path, byte_offset, fingerprint) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET
                 byte_offset = excluded.byte_offset,
                 fingerprint = excluded.fingerprint",
            params![path, offset, mark.fingerprint],
        )?;
        Ok(())
    }

    /// Untimed commands already taken from `path`, as digest to count.
    pub fn file_commands(&self, path: &str) -> Result<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT digest, seen FROM watch_commands WHERE path = ?1")?;
        let rows = stmt
            .query_map(params![path], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|(digest, seen)| (digest, u64::try_from(seen).unwrap_or(0)))
            .collect())
    }

    pub fn record_file_commands(
        &self,
        path: &str,
        counts: &HashMap<String, u64>,
        update: SeenUpdate,
    ) -> Result<()> {
        let sql = match update {
            SeenUpdate::Add => {
                "INSERT INTO watch_commands (path, digest, seen) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path, digest) DO UPDATE SET seen = seen + excluded.seen"
            }
            SeenUpdate::Max => {
                "INSERT INTO watch_commands (path, digest, seen) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path, digest) DO UPDATE SET seen = MAX(seen, excluded.seen)"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        for (digest, seen) in counts {
            let seen = i64::try_from(*seen).unwrap_or(i64::MAX);
            stmt.execute(params![path, digest, seen])?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
