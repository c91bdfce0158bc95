// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The long-running mode: serve the peer, follow the history file, and pull
//! after every local change and on a fixed interval.

use std::future::Future;
use std::time::Duration;

use syncsh_core::{SyncNode, Tunnel};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::ingest_file;
use crate::provision::Provisioner;
use crate::watch::HistoryWatcher;

use super::{bring_up, close_after, load, open_db, runtime};

pub fn run(interval_secs: u64) -> Result<()> {
    let (config, _) = load()?;
    let db = open_db(&config)?;
    let node = SyncNode::new(db, config.machine_id.clone());
    let interval = Duration::from_secs(interval_secs);

    runtime()?.block_on(async {
        let mut tunnel = bring_up(&config, &Provisioner::from_env()).await?;
        let result = run_impl(&node, &tunnel, &config, interval, shutdown_signal()).await;
        close_after(&mut tunnel, result).await
    })
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}

/// Serve and follow until `shutdown` resolves or the server fails.
///
/// The tunnel is left open; the caller closes it.
pub(crate) async fn run_impl(
    node: &SyncNode,
    tunnel: &Tunnel,
    config: &Config,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut watcher = HistoryWatcher::new(std::slice::from_ref(&config.history_path))?;
    let listener = tunnel.listen(config.listen_port).await?;
    let mut server = tokio::spawn({
        let node = node.clone();
        async move { node.serve(listener).await }
    });

    ingest(node, config).await;
    pull(node, tunnel, config).await;

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            served = &mut server => {
                break Err(match served {
                    Ok(Ok(())) => Error::ServerStopped("listener closed".to_string()),
                    Ok(Err(e)) => e.into(),
                    Err(e) => Error::ServerStopped(e.to_string()),
                });
            }
            changed = watcher.changed() => {
                if changed.is_none() {
                    break Err(Error::Watch {
                        path: config.history_path.clone(),
                        reason: "watcher stopped".to_string(),
                    });
                }
                ingest(node, config).await;
                pull(node, tunnel, config).await;
            }
            _ = ticker.tick() => pull(node, tunnel, config).await,
        }
    };
    server.abort();
    info!("stopped following history");
    result
}

/// Ingest new local history; failures are logged and retried on the next change.
async fn ingest(node: &SyncNode, config: &Config) {
    let result = node
        .with_db(|db| {
            ingest_file(
                db,
                config.shell,
                &config.history_path,
                &config.machine_id,
            )
        })
        .await;
    if let Err(e) = result {
        warn!(path = %config.history_path.display(), error = %e, "history ingest failed");
    }
}

/// Pull from the peer; failures are logged and retried on the next trigger.
async fn pull(node: &SyncNode, tunnel: &Tunnel, config: &Config) {
    let expected = config.peer.as_ref().and_then(|p| p.machine_id.as_deref());
    match node.sync_with(tunnel, config.listen_port, expected).await {
        Ok(report) => {
            debug!(remote = %report.remote, inserted = report.inserted, "pulled from peer")
        }
        Err(e) => warn!(error = %e, "pull from peer failed"),
    }
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
