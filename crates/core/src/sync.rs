// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental history exchange between the two peers.
//!
//! Each machine is both a server (answering "your entries since T") and a
//! client (asking the other side the same question). A pull round reads the
//! cursor once, fetches the batch, and ingests it together with the new
//! cursor in one transaction, so an interrupted round can always be retried
//! from the last persisted cursor.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::{Database, ListFilter};
use crate::entry::HistoryEntry;
use crate::error::{Error, Result};
use crate::protocol::{read_message, write_message, Request, Response, PROTOCOL_VERSION};
use crate::tunnel::{BoxFuture, Connection, Tunnel, TunnelListener};

/// Default port of the sync service on the tunnel addresses.
pub const DEFAULT_SYNC_PORT: u16 = 7423;

/// Where a pull round gets the remote batch from.
pub trait PeerSource: Send {
    /// The remote's own entries with `timestamp > since`.
    fn entries_since(&mut self, since: i64) -> BoxFuture<'_, Result<Vec<HistoryEntry>>>;
}

/// Outcome of one pull round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub remote: String,
    /// Entries in the batch.
    pub received: usize,
    /// Entries that were new to the local store.
    pub inserted: usize,
    pub cursor_before: i64,
    pub cursor_after: i64,
}

/// Shared handle to the local store and identity.
#[derive(Clone)]
pub struct SyncNode {
    inner: Arc<SyncNodeInner>,
}

struct SyncNodeInner {
    machine_id: String,
    db: Mutex<Database>,
    /// One lock per remote machine; at most one round in flight per peer.
    rounds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncNode {
    pub fn new(db: Database, machine_id: impl Into<String>) -> Self {
        SyncNode {
            inner: Arc::new(SyncNodeInner {
                machine_id: machine_id.into(),
                db: Mutex::new(db),
                rounds: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.inner.machine_id
    }

    /// Run `f` against the store.
    pub async fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.inner.db.lock().await;
        f(&mut db)
    }

    async fn round_lock(&self, remote: &str) -> Arc<Mutex<()>> {
        let mut rounds = self.inner.rounds.lock().await;
        rounds.entry(remote.to_string()).or_default().clone()
    }

    /// Pull everything `remote` recorded since our cursor for it.
    ///
    /// Any failure leaves the store and the cursor untouched.
    pub async fn pull_round(
        &self,
        remote: &str,
        peer: &mut dyn PeerSource,
    ) -> Result<RoundReport> {
        let lock = self.round_lock(remote).await;
        let _round = lock.lock().await;

        let cursor = self.with_db(|db| db.scope().get_cursor(remote)).await?;
        debug!(remote, cursor, "requesting entries");
        let batch = peer.entries_since(cursor).await?;
        check_batch(remote, &batch)?;

        let received = batch.len();
        let (inserted, cursor_after) = self
            .with_db(|db| {
                db.transaction(|scope| {
                    let mut inserted = 0;
                    let mut newest = cursor;
                    for entry in &batch {
                        let mut entry = HistoryEntry {
                            id: None,
                            ..entry.clone()
                        };
                        if scope.record_entry(&mut entry)? {
                            inserted += 1;
                        }
                        newest = newest.max(entry.timestamp);
                    }
                    if newest > cursor {
                        scope.set_cursor(remote, newest)?;
                    }
                    Ok((inserted, newest))
                })
            })
            .await?;

        info!(remote, received, inserted, cursor = cursor_after, "sync round complete");
        Ok(RoundReport {
            remote: remote.to_string(),
            received,
            inserted,
            cursor_before: cursor,
            cursor_after,
        })
    }

    /// Dial the peer through `tunnel`, identify it, and pull once.
    ///
    /// When `expected` is set, a peer reporting any other machine id is
    /// refused before anything is fetched.
    pub async fn sync_with(
        &self,
        tunnel: &Tunnel,
        port: u16,
        expected: Option<&str>,
    ) -> Result<RoundReport> {
        let conn = tunnel.dial_peer(port).await?;
        let mut client = PeerClient::new(conn);
        let remote = client.hello(self.machine_id()).await?;
        if remote == self.machine_id() {
            return Err(Error::Protocol(format!(
                "peer reports our own machine id '{remote}'"
            )));
        }
        if let Some(expected) = expected {
            if expected != remote {
                return Err(Error::Protocol(format!(
                    "expected peer '{expected}' but '{remote}' answered"
                )));
            }
        }
        self.pull_round(&remote, &mut client).await
    }

    /// Answer requests on one connection until the caller hangs up.
    pub async fn serve_connection(&self, mut conn: Connection) -> Result<()> {
        while let Some(request) = read_message::<_, Request>(&mut conn).await? {
            let response = match request {
                Request::Hello {
                    machine_id,
                    version,
                } => {
                    if version != PROTOCOL_VERSION {
                        let reply = Response::error(format!(
                            "unsupported protocol version {version} (expected {PROTOCOL_VERSION})"
                        ));
                        write_message(&mut conn, &reply).await?;
                        return Err(Error::Protocol(format!(
                            "peer '{machine_id}' speaks protocol version {version}"
                        )));
                    }
                    debug!(peer = %machine_id, "peer connected");
                    Response::hello(self.machine_id())
                }
                Request::EntriesSince { since } => {
                    let filter = ListFilter::new().machine(self.machine_id()).since(since);
                    match self.with_db(|db| db.scope().list(&filter)).await {
                        Ok(entries) => {
                            debug!(since, count = entries.len(), "serving entries");
                            Response::entries(entries)
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to list entries for peer");
                            Response::error(e.to_string())
                        }
                    }
                }
                Request::Ping { id } => Response::pong(id),
            };
            write_message(&mut conn, &response).await?;
        }
        Ok(())
    }

    /// Accept connections and serve each on its own task.
    ///
    /// Returns when the listener fails, e.g. because the tunnel closed.
    pub async fn serve(&self, mut listener: Box<dyn TunnelListener>) -> Result<()> {
        info!(addr = %listener.local_addr(), "serving sync requests");
        loop {
            let (conn, peer) = listener.accept().await?;
            debug!(%peer, "accepted sync connection");
            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = node.serve_connection(conn).await {
                    warn!(%peer, error = %e, "sync connection failed");
                }
            });
        }
    }
}

/// Reject batches that could not have come from an honest peer.
fn check_batch(remote: &str, batch: &[HistoryEntry]) -> Result<()> {
    for entry in batch {
        if entry.machine_id != remote {
            return Err(Error::Protocol(format!(
                "peer '{remote}' sent an entry recorded by '{}'",
                entry.machine_id
            )));
        }
        if !entry.verify_hash() {
            return Err(Error::Protocol(format!(
                "entry {} does not match its content",
                entry.hash
            )));
        }
    }
    Ok(())
}

/// Client side of the sync protocol over one tunnel connection.
pub struct PeerClient {
    conn: Connection,
    next_ping: u64,
}

impl PeerClient {
    pub fn new(conn: Connection) -> Self {
        PeerClient { conn, next_ping: 0 }
    }

    async fn call(&mut self, request: &Request) -> Result<Response> {
        write_message(&mut self.conn, request).await?;
        match read_message::<_, Response>(&mut self.conn).await? {
            None => Err(Error::Protocol("peer closed the connection".to_string())),
            Some(Response::Error { message }) => {
                Err(Error::Protocol(format!("peer error: {message}")))
            }
            Some(response) => Ok(response),
        }
    }

    /// Introduce ourselves and learn the peer's machine id.
    pub async fn hello(&mut self, machine_id: &str) -> Result<String> {
        match self.call(&Request::hello(machine_id)).await? {
            Response::Hello {
                machine_id,
                version,
            } if version == PROTOCOL_VERSION => Ok(machine_id),
            Response::Hello { version, .. } => Err(Error::Protocol(format!(
                "peer speaks protocol version {version}"
            ))),
            other => Err(unexpected("hello", &other)),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.next_ping += 1;
        let id = self.next_ping;
        match self.call(&Request::ping(id)).await? {
            Response::Pong { id: got } if got == id => Ok(()),
            other => Err(unexpected("pong", &other)),
        }
    }
}

impl PeerSource for PeerClient {
    fn entries_since(&mut self, since: i64) -> BoxFuture<'_, Result<Vec<HistoryEntry>>> {
        Box::pin(async move {
            match self.call(&Request::entries_since(since)).await? {
                Response::Entries { entries } => Ok(entries),
                other => Err(unexpected("entries", &other)),
            }
        })
    }
}

fn unexpected(wanted: &str, got: &Response) -> Error {
    Error::Protocol(format!("expected {wanted} response, got {got:?}"))
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
