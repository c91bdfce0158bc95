// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::addr::Role;
use crate::key::{KeyMaterial, SecretKey};
use crate::link::{build_config, PeerLinkConfig};
use crate::tunnel::MemoryNetwork;

const PORT: u16 = DEFAULT_SYNC_PORT;

/// A remote store answering from a fixed set of entries.
#[derive(Default)]
struct FakePeer {
    entries: Vec<HistoryEntry>,
    requests: Vec<i64>,
    /// Return everything regardless of `since`, like a peer re-delivering.
    ignore_since: bool,
    fail: Option<String>,
}

impl FakePeer {
    fn with(machine: &str, stamps: &[i64]) -> Self {
        FakePeer {
            entries: stamps
                .iter()
                .map(|ts| HistoryEntry::new(*ts, machine, format!("cmd-{ts}")))
                .collect(),
            ..Default::default()
        }
    }
}

impl PeerSource for FakePeer {
    fn entries_since(&mut self, since: i64) -> BoxFuture<'_, Result<Vec<HistoryEntry>>> {
        Box::pin(async move {
            self.requests.push(since);
            if let Some(reason) = &self.fail {
                return Err(Error::Engine(reason.clone()));
            }
            let mut out: Vec<HistoryEntry> = self
                .entries
                .iter()
                .filter(|e| self.ignore_since || since <= 0 || e.timestamp > since)
                .cloned()
                .collect();
            out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            Ok(out)
        })
    }
}

fn node(machine: &str) -> SyncNode {
    SyncNode::new(Database::open_in_memory().unwrap(), machine)
}

async fn stamps(node: &SyncNode, machine: &str) -> Vec<i64> {
    node.with_db(|db| db.scope().list(&ListFilter::new().machine(machine)))
        .await
        .unwrap()
        .iter()
        .map(|e| e.timestamp)
        .collect()
}

async fn cursor(node: &SyncNode, machine: &str) -> i64 {
    node.with_db(|db| db.scope().get_cursor(machine)).await.unwrap()
}

#[tokio::test]
async fn pull_fetches_only_entries_after_cursor() {
    let b = node("B");
    b.with_db(|db| db.scope().set_cursor("A", 100)).await.unwrap();
    let mut a = FakePeer::with("A", &[90, 110, 120]);

    let report = b.pull_round("A", &mut a).await.unwrap();

    assert_eq!(a.requests, vec![100]);
    assert_eq!(report.received, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.cursor_after, 120);
    assert_eq!(stamps(&b, "A").await, vec![120, 110]);
    assert_eq!(cursor(&b, "A").await, 120);
}

#[tokio::test]
async fn repeated_round_changes_nothing() {
    let b = node("B");
    let mut a = FakePeer::with("A", &[10, 20]);
    b.pull_round("A", &mut a).await.unwrap();

    let again = b.pull_round("A", &mut a).await.unwrap();
    assert_eq!(again.received, 0);
    assert_eq!(again.cursor_before, 20);
    assert_eq!(again.cursor_after, 20);
    assert_eq!(stamps(&b, "A").await, vec![20, 10]);
    assert_eq!(a.requests, vec![0, 20]);
}

#[tokio::test]
async fn redelivered_entries_count_as_already_recorded() {
    let b = node("B");
    let mut a = FakePeer::with("A", &[10, 20]);
    b.pull_round("A", &mut a).await.unwrap();

    a.ignore_since = true;
    let report = b.pull_round("A", &mut a).await.unwrap();
    assert_eq!(report.received, 2);
    assert_eq!(report.inserted, 0);
    assert_eq!(stamps(&b, "A").await, vec![20, 10]);
}

#[tokio::test]
async fn empty_batch_leaves_cursor_absent() {
    let b = node("B");
    let mut a = FakePeer::default();

    let report = b.pull_round("A", &mut a).await.unwrap();
    assert_eq!(report.received, 0);
    assert!(b.with_db(|db| db.scope().cursors()).await.unwrap().is_empty());
}

#[tokio::test]
async fn cursor_never_moves_backwards() {
    let b = node("B");
    b.with_db(|db| db.scope().set_cursor("A", 200)).await.unwrap();
    let mut a = FakePeer::with("A", &[150]);
    a.ignore_since = true;

    let report = b.pull_round("A", &mut a).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(cursor(&b, "A").await, 200);
}

#[tokio::test]
async fn transport_failure_keeps_cursor() {
    let b = node("B");
    b.with_db(|db| db.scope().set_cursor("A", 50)).await.unwrap();
    let mut a = FakePeer::with("A", &[60]);
    a.fail = Some("connection reset".to_string());

    let err = b.pull_round("A", &mut a).await.unwrap_err();
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(cursor(&b, "A").await, 50);
}

#[tokio::test]
async fn failure_mid_batch_rolls_back_whole_round() {
    let b = node("B");
    b.with_db(|db| {
        db.conn.execute_batch(
            "CREATE TRIGGER fail_on_boom BEFORE INSERT ON history_entries
             WHEN NEW.command = 'boom'
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    // Newest first: 30 is stored, then 20 fails.
    let mut a = FakePeer {
        entries: vec![
            HistoryEntry::new(10, "A", "ls"),
            HistoryEntry::new(20, "A", "boom"),
            HistoryEntry::new(30, "A", "pwd"),
        ],
        ..Default::default()
    };

    let err = b.pull_round("A", &mut a).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "{err}");
    assert!(stamps(&b, "A").await.is_empty());
    assert_eq!(cursor(&b, "A").await, 0);

    b.with_db(|db| {
        db.conn.execute_batch("DROP TRIGGER fail_on_boom")?;
        Ok(())
    })
    .await
    .unwrap();
    let report = b.pull_round("A", &mut a).await.unwrap();
    assert_eq!(a.requests, vec![0, 0]);
    assert_eq!(report.inserted, 3);
    assert_eq!(cursor(&b, "A").await, 30);
}

#[tokio::test]
async fn tampered_entry_aborts_round() {
    let b = node("B");
    let mut a = FakePeer::with("A", &[10, 20]);
    a.entries[1].command = "rm -rf /".to_string();

    let err = b.pull_round("A", &mut a).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(stamps(&b, "A").await.is_empty());
}

#[tokio::test]
async fn foreign_entry_aborts_round() {
    let b = node("B");
    let mut a = FakePeer::with("A", &[10]);
    a.entries.push(HistoryEntry::new(11, "C", "whoami"));

    let err = b.pull_round("A", &mut a).await.unwrap_err();
    assert!(err.to_string().contains("'C'"), "{err}");
    assert_eq!(cursor(&b, "A").await, 0);
}

/// Records the highest number of overlapping fetches.
struct SlowPeer {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    ts: i64,
}

impl PeerSource for SlowPeer {
    fn entries_since(&mut self, _since: i64) -> BoxFuture<'_, Result<Vec<HistoryEntry>>> {
        Box::pin(async move {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![HistoryEntry::new(self.ts, "A", "sleep")])
        })
    }
}

#[tokio::test]
async fn rounds_for_same_peer_are_serialized() {
    let b = node("B");
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (1..=4)
        .map(|ts| {
            let b = b.clone();
            let mut peer = SlowPeer {
                active: active.clone(),
                peak: peak.clone(),
                ts,
            };
            tokio::spawn(async move { b.pull_round("A", &mut peer).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(cursor(&b, "A").await, 4);
}

fn paired_configs() -> (PeerLinkConfig, PeerLinkConfig) {
    let a = SecretKey::generate();
    let b = SecretKey::generate();
    let initiator = build_config(
        Role::Initiator,
        "198.51.100.2:51820",
        KeyMaterial::new(a.to_base64().as_str()),
        KeyMaterial::new(b.public_key().to_base64()),
    )
    .unwrap();
    let responder = build_config(
        Role::Responder,
        "198.51.100.1:51820",
        KeyMaterial::new(b.to_base64().as_str()),
        KeyMaterial::new(a.public_key().to_base64()),
    )
    .unwrap();
    (initiator, responder)
}

async fn seed(node: &SyncNode, stamps: &[i64]) {
    let machine = node.machine_id().to_string();
    node.with_db(|db| {
        for ts in stamps {
            let mut entry = HistoryEntry::new(*ts, machine.as_str(), format!("{machine}-{ts}"));
            db.scope().create_entry(&mut entry)?;
        }
        Ok(())
    })
    .await
    .unwrap();
}

/// Bring up both ends of a link and start both servers.
async fn linked(a: &SyncNode, b: &SyncNode) -> (Tunnel, Tunnel) {
    let network = MemoryNetwork::new();
    let (a_cfg, b_cfg) = paired_configs();
    let mut ta = Tunnel::new(Arc::new(network.engine()));
    let mut tb = Tunnel::new(Arc::new(network.engine()));
    ta.connect(&a_cfg).await.unwrap();
    tb.connect(&b_cfg).await.unwrap();

    for (node, tunnel) in [(a, &ta), (b, &tb)] {
        let listener = tunnel.listen(PORT).await.unwrap();
        let node = node.clone();
        tokio::spawn(async move { node.serve(listener).await });
    }
    (ta, tb)
}

#[tokio::test]
async fn bidirectional_round_yields_union() {
    let a = node("A");
    let b = node("B");
    seed(&a, &[10, 20, 30]).await;
    seed(&b, &[15, 25, 35]).await;
    let (mut ta, mut tb) = linked(&a, &b).await;

    let (ra, rb) = tokio::join!(
        a.sync_with(&ta, PORT, Some("B")),
        b.sync_with(&tb, PORT, Some("A"))
    );
    assert_eq!(ra.unwrap().inserted, 3);
    assert_eq!(rb.unwrap().inserted, 3);

    for n in [&a, &b] {
        assert_eq!(n.with_db(|db| db.scope().count(None)).await.unwrap(), 6);
    }
    assert_eq!(cursor(&a, "B").await, 35);
    assert_eq!(cursor(&b, "A").await, 30);

    // Nothing new: a second round is a no-op on both sides.
    let ra = a.sync_with(&ta, PORT, None).await.unwrap();
    assert_eq!((ra.received, ra.cursor_after), (0, 35));

    ta.close().await.unwrap();
    tb.close().await.unwrap();
}

#[tokio::test]
async fn server_only_sends_its_own_entries() {
    let a = node("A");
    let b = node("B");
    seed(&a, &[10]).await;
    seed(&b, &[20]).await;
    let (mut ta, mut tb) = linked(&a, &b).await;

    // A now holds B's entry as well as its own.
    a.sync_with(&ta, PORT, None).await.unwrap();
    assert_eq!(a.with_db(|db| db.scope().count(None)).await.unwrap(), 2);

    // B must only be offered A's own entry, never its own echoed back.
    let report = b.sync_with(&tb, PORT, None).await.unwrap();
    assert_eq!(report.received, 1);
    assert_eq!(stamps(&b, "A").await, vec![10]);

    ta.close().await.unwrap();
    tb.close().await.unwrap();
}

#[tokio::test]
async fn unexpected_peer_identity_is_refused() {
    let a = node("A");
    let b = node("B");
    seed(&b, &[20]).await;
    let (mut ta, mut tb) = linked(&a, &b).await;

    let err = a.sync_with(&ta, PORT, Some("laptop")).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(err.to_string().contains("laptop"));
    assert_eq!(a.with_db(|db| db.scope().count(None)).await.unwrap(), 0);

    ta.close().await.unwrap();
    tb.close().await.unwrap();
}

#[tokio::test]
async fn sync_requires_established_tunnel() {
    let a = node("A");
    let ta = Tunnel::new(Arc::new(MemoryNetwork::new().engine()));
    let err = a.sync_with(&ta, PORT, None).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[tokio::test]
async fn server_answers_ping_and_rejects_old_versions() {
    let a = node("A");
    let (client_side, server_side) = tokio::io::duplex(4096);
    let server = {
        let a = a.clone();
        tokio::spawn(async move { a.serve_connection(Box::new(server_side)).await })
    };

    let mut client = PeerClient::new(Box::new(client_side));
    client.ping().await.unwrap();
    assert_eq!(client.hello("B").await.unwrap(), "A");

    write_message(
        &mut client.conn,
        &Request::Hello {
            machine_id: "B".to_string(),
            version: 99,
        },
    )
    .await
    .unwrap();
    let reply: Option<Response> = read_message(&mut client.conn).await.unwrap();
    assert!(matches!(reply, Some(Response::Error { .. })));
    assert!(server.await.unwrap().is_err());
}

#[tokio::test]
async fn server_stops_cleanly_on_hangup() {
    let a = node("A");
    let (client_side, server_side) = tokio::io::duplex(64);
    drop(client_side);
    a.serve_connection(Box::new(server_side)).await.unwrap();
}
