// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental import of a shell history file into the store.
//!
//! The store keeps, per file, the byte offset reached and a digest of the
//! bytes before it, so repeated ingests only parse what the shell appended
//! since. The offset only ever advances to a line boundary where the parser
//! holds no partial command.
//!
//! A shell may also rewrite the file: bash truncates it to `HISTFILESIZE`,
//! and some shells rename a fresh copy over it. A digest mismatch (or a
//! shorter file) means the file is re-read from the start. Untimed commands
//! would get a new timestamp and hash on a re-read, so each file also keeps
//! a count of the untimed commands already taken from it; a re-read only
//! records those beyond the count.

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use syncsh_core::{Database, FileMark, HistoryEntry, ParsedLine, Result, SeenUpdate, ShellKind};
use tracing::{debug, info, warn};

/// Outcome of one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Commands parsed from the new bytes.
    pub commands: usize,
    /// Commands that were new to the store.
    pub inserted: usize,
    /// Offset stored after the pass.
    pub offset: u64,
}

impl IngestReport {
    pub fn duplicates(&self) -> usize {
        self.commands - self.inserted
    }
}

/// Ingest whatever was appended to `path`, stamping untimed commands with now.
pub fn ingest_file(
    db: &mut Database,
    shell: ShellKind,
    path: &Path,
    machine_id: &str,
) -> Result<IngestReport> {
    ingest_file_at(db, shell, path, machine_id, chrono::Utc::now().timestamp())
}

/// [`ingest_file`] with an explicit timestamp for untimed commands.
pub fn ingest_file_at(
    db: &mut Database,
    shell: ShellKind,
    path: &Path,
    machine_id: &str,
    now: i64,
) -> Result<IngestReport> {
    let key = path.to_string_lossy();
    let mark = db.scope().file_mark(&key)?;

    let buf = std::fs::read(path)?;
    let len = buf.len() as u64;
    let rewritten = mark.offset > 0
        && (len < mark.offset || digest(&buf[..mark.offset as usize]) != mark.fingerprint);
    let start = if rewritten {
        warn!(
            path = %key,
            stored = mark.offset,
            len,
            "history file was rewritten, re-reading from the start"
        );
        0
    } else {
        mark.offset
    };
    if !rewritten && len == start {
        return Ok(IngestReport {
            offset: start,
            ..IngestReport::default()
        });
    }

    let (parsed, committed) = parse_complete(shell, &buf, start as usize);

    // From the start of the file, commands taken on earlier passes are
    // skipped up to their stored count.
    let mut seen = if start == 0 {
        db.scope().file_commands(&key)?
    } else {
        HashMap::new()
    };
    let mut taken: HashMap<String, u64> = HashMap::new();
    let commands = parsed.len();
    let mut entries = Vec::with_capacity(commands);
    for cmd in parsed {
        if cmd.timestamp.is_none() {
            let command_digest = digest(cmd.command.as_bytes());
            *taken.entry(command_digest.clone()).or_default() += 1;
            if let Some(left) = seen.get_mut(&command_digest).filter(|left| **left > 0) {
                *left -= 1;
                continue;
            }
        }
        entries.push(
            HistoryEntry::new(cmd.timestamp.unwrap_or(now), machine_id, cmd.command)
                .with_duration(cmd.duration),
        );
    }

    let update = if start == 0 {
        SeenUpdate::Max
    } else {
        SeenUpdate::Add
    };
    let new_mark = FileMark {
        offset: committed,
        fingerprint: if committed == 0 {
            String::new()
        } else {
            digest(&buf[..committed as usize])
        },
    };
    let inserted = db.transaction(|scope| {
        let mut inserted = 0;
        for entry in &mut entries {
            if scope.record_entry(entry)? {
                inserted += 1;
            }
        }
        scope.record_file_commands(&key, &taken, update)?;
        scope.set_file_mark(&key, &new_mark)?;
        Ok(inserted)
    })?;

    if inserted > 0 {
        info!(path = %key, inserted, "ingested history entries");
    } else {
        debug!(path = %key, commands, "no new history entries");
    }
    Ok(IngestReport {
        commands,
        inserted,
        offset: committed,
    })
}

struct ParsedCommand {
    command: String,
    timestamp: Option<i64>,
    duration: i64,
}

/// Parse the complete lines of `buf` from `start`.
///
/// Returns the commands and the offset just past the last line at which the
/// parser was idle; a trailing partial line is left for next time.
fn parse_complete(shell: ShellKind, buf: &[u8], start: usize) -> (Vec<ParsedCommand>, u64) {
    let mut parser = shell.parser();
    let mut parsed = Vec::new();
    let mut pending = Vec::new();
    let mut committed = start;
    let mut pos = start;

    while let Some(nl) = buf[pos..].iter().position(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(&buf[pos..pos + nl]);
        pos += nl + 1;
        if let ParsedLine::Command {
            command,
            timestamp,
            duration,
        } = parser.parse_line(&line)
        {
            pending.push(ParsedCommand {
                command,
                timestamp,
                duration,
            });
        }
        if parser.is_idle() {
            parsed.append(&mut pending);
            committed = pos;
        }
    }
    (parsed, committed as u64)
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
