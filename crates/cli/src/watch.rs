// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change notifications for history files.
//!
//! Shells may replace the history file instead of appending to it, so the
//! watch is placed on the parent directory and events are filtered down to
//! the files of interest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Pending notifications kept before further events are coalesced.
const CHANNEL_CAPACITY: usize = 16;

/// Forwards modify/create events for a set of files into a channel.
///
/// Dropping the watcher stops notifications; a new one can be built at any
/// time to restart watching.
pub struct HistoryWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
}

impl HistoryWatcher {
    pub fn new(paths: &[PathBuf]) -> Result<Self> {
        let mut targets = HashSet::new();
        let mut dirs = HashSet::new();
        for path in paths {
            let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
                return Err(watch_error(path, "has no parent directory"));
            };
            let dir = dir
                .canonicalize()
                .map_err(|e| watch_error(path, &e.to_string()))?;
            targets.insert(path.clone());
            targets.insert(dir.join(name));
            dirs.insert(dir);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "watch error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            for path in event.paths.iter().filter(|p| targets.contains(*p)) {
                // Full channel: a notification is already queued.
                let _ = tx.try_send(path.clone());
            }
        })
        .map_err(|e| watch_error(first(paths), &e.to_string()))?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| watch_error(dir, &e.to_string()))?;
            debug!(dir = %dir.display(), "watching history directory");
        }

        Ok(HistoryWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next change. `None` once the watcher has shut down.
    pub async fn changed(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}

fn first(paths: &[PathBuf]) -> &Path {
    paths.first().map(PathBuf::as_path).unwrap_or(Path::new("."))
}

fn watch_error(path: &Path, reason: &str) -> Error {
    Error::Watch {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
