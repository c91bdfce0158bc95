// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use serde::Serialize;
use syncsh_core::{assign_addresses, Database, Role, SyncCursor};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;

use super::{load, open_db};

#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    machine_id: String,
    shell: String,
    history_path: String,
    db_path: String,
    interface: String,
    public_key: String,
    listen_port: u16,
    peer: Option<PeerStatus>,
    entries: i64,
    local_entries: i64,
    cursors: Vec<SyncCursor>,
}

#[derive(Debug, Serialize)]
struct PeerStatus {
    role: Role,
    endpoint: String,
    machine_id: Option<String>,
    local_address: Ipv4Addr,
    remote_address: Ipv4Addr,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let (config, _) = load()?;
    let db = open_db(&config)?;
    let report = run_impl(&db, &config)?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render(&report)),
    }
    Ok(())
}

/// Internal implementation that accepts db for testing.
pub(crate) fn run_impl(db: &Database, config: &Config) -> Result<StatusReport> {
    let scope = db.scope();
    let peer = config.peer.as_ref().map(|peer| {
        let addrs = assign_addresses(peer.role);
        PeerStatus {
            role: peer.role,
            endpoint: peer.endpoint.clone(),
            machine_id: peer.machine_id.clone(),
            local_address: addrs.local,
            remote_address: addrs.remote,
        }
    });
    Ok(StatusReport {
        machine_id: config.machine_id.clone(),
        shell: config.shell.to_string(),
        history_path: config.history_path.display().to_string(),
        db_path: config.db_path.display().to_string(),
        interface: config.interface.clone(),
        public_key: config.public_key.clone(),
        listen_port: config.listen_port,
        peer,
        entries: scope.count(None)?,
        local_entries: scope.count(Some(&config.machine_id))?,
        cursors: scope.cursors()?,
    })
}

pub(crate) fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Machine:    {}", report.machine_id);
    let _ = writeln!(out, "Shell:      {} ({})", report.shell, report.history_path);
    let _ = writeln!(out, "Database:   {}", report.db_path);
    let _ = writeln!(out, "Public key: {}", report.public_key);
    match &report.peer {
        Some(peer) => {
            let _ = writeln!(
                out,
                "Peer:       {} via {} as {}",
                peer.machine_id.as_deref().unwrap_or("(any)"),
                peer.endpoint,
                peer.role
            );
            let _ = writeln!(
                out,
                "Link:       {} {} -> {} (sync port {})",
                report.interface, peer.local_address, peer.remote_address, report.listen_port
            );
        }
        None => {
            let _ = writeln!(out, "Peer:       not paired");
        }
    }
    let _ = writeln!(
        out,
        "Entries:    {} ({} recorded here)",
        report.entries, report.local_entries
    );
    for cursor in &report.cursors {
        let _ = writeln!(
            out,
            "Synced:     {} up to {}",
            cursor.machine_id, cursor.last_sync_timestamp
        );
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
