// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::commands::testing::paired;
use syncsh_core::tunnel::MemoryNetwork;
use syncsh_core::{HistoryEntry, SyncNode};
use tokio::sync::oneshot;

async fn count_from(node: &SyncNode, machine: &str) -> i64 {
    node.with_db(|db| db.scope().count(Some(machine)))
        .await
        .unwrap()
}

/// Poll until `machine` has at least `n` entries in `node`, or time out.
async fn wait_for(node: &SyncNode, machine: &str, n: i64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while count_from(node, machine).await < n {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("entries did not arrive");
}

#[tokio::test]
async fn test_connect_follows_history_and_serves_peer() {
    let (laptop, desktop) = paired();
    laptop.append_history(": 100:0;ls\n");
    let desktop_node = desktop.node();
    desktop_node
        .with_db(|db| db.scope().create_entry(&mut HistoryEntry::new(90, "desktop", "top")))
        .await
        .unwrap();

    let network = MemoryNetwork::new();
    let mut dt = desktop.tunnel(&network).await;
    let listener = dt.listen(desktop.config.listen_port).await.unwrap();
    {
        let node = desktop_node.clone();
        tokio::spawn(async move { node.serve(listener).await });
    }

    let laptop_node = laptop.node();
    let lt = laptop.tunnel(&network).await;
    let config = laptop.config.clone();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let follower = {
        let node = laptop_node.clone();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = stop_rx.await;
            };
            let result = run_impl(&node, &lt, &config, Duration::from_secs(3600), shutdown).await;
            (result, lt)
        })
    };

    // Startup ingests the existing history and pulls once.
    wait_for(&laptop_node, "laptop", 1).await;
    wait_for(&laptop_node, "desktop", 1).await;

    // A new command is ingested from the watch event.
    laptop.append_history(": 200:0;cargo build\n");
    wait_for(&laptop_node, "laptop", 2).await;

    // The laptop serves its own entries to the desktop.
    let report = desktop_node
        .sync_with(&dt, desktop.config.listen_port, Some("laptop"))
        .await
        .unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.cursor_after, 200);

    stop_tx.send(()).unwrap();
    let (result, mut lt) = follower.await.unwrap();
    result.unwrap();
    lt.close().await.unwrap();
    dt.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_keeps_running_while_peer_is_away() {
    let (laptop, _desktop) = paired();
    let network = MemoryNetwork::new();
    let lt = laptop.tunnel(&network).await;
    let node = laptop.node();

    // Nobody listens on the peer side: pulls fail, the loop carries on.
    let shutdown = tokio::time::sleep(Duration::from_millis(300));
    let result = run_impl(&node, &lt, &laptop.config, Duration::from_millis(50), shutdown).await;
    assert!(result.is_ok(), "{result:?}");

    let mut lt = lt;
    lt.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_unwatchable_history_leaves_port_free() {
    let (mut laptop, _desktop) = paired();
    laptop.config.history_path = laptop.home.join("missing").join("zsh_history");
    let network = MemoryNetwork::new();
    let mut lt = laptop.tunnel(&network).await;
    let node = laptop.node();

    let result = run_impl(&node, &lt, &laptop.config, Duration::from_secs(3600), async {}).await;
    assert!(matches!(result, Err(Error::Watch { .. })), "{result:?}");

    // Nothing is left serving on the sync port.
    let listener = lt.listen(laptop.config.listen_port).await;
    assert!(listener.is_ok());
    drop(listener);
    lt.close().await.unwrap();
}
