// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use syncsh_core::{RoundReport, SyncNode, Tunnel};

use crate::config::Config;
use crate::error::Result;
use crate::provision::Provisioner;

use super::{bring_up, close_after, load, open_db, runtime};

pub fn run() -> Result<()> {
    let (config, _) = load()?;
    let db = open_db(&config)?;
    let node = SyncNode::new(db, config.machine_id.clone());

    let report = runtime()?.block_on(async {
        let mut tunnel = bring_up(&config, &Provisioner::from_env()).await?;
        let result = run_impl(&node, &tunnel, &config).await;
        close_after(&mut tunnel, result).await
    })?;

    println!(
        "Received {} entries from {} ({} new)",
        report.received, report.remote, report.inserted
    );
    Ok(())
}

/// One pull round from the paired peer over an established tunnel.
pub(crate) async fn run_impl(
    node: &SyncNode,
    tunnel: &Tunnel,
    config: &Config,
) -> Result<RoundReport> {
    let peer = config.peer()?;
    let report = node
        .sync_with(tunnel, config.listen_port, peer.machine_id.as_deref())
        .await?;
    Ok(report)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
