// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process tunnel engine for tests.
//!
//! Devices opened on the same [`MemoryNetwork`] can reach each other when
//! their keys are paired (each side's remote key is the other's public key)
//! and the destination is the device's single allowed remote host.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use super::{BoxFuture, Connection, EngineParams, TunnelDevice, TunnelEngine, TunnelListener};
use crate::error::{Error, Result};
use crate::key::PublicKey;

const DUPLEX_CAPACITY: usize = 64 * 1024;
const FIRST_EPHEMERAL_PORT: u16 = 49152;

type Incoming = (DuplexStream, SocketAddr);

struct DeviceEntry {
    public: PublicKey,
    peer: PublicKey,
}

#[derive(Default)]
struct NetworkState {
    devices: HashMap<Ipv4Addr, DeviceEntry>,
    listeners: HashMap<SocketAddrV4, mpsc::Sender<Incoming>>,
    next_port: u16,
    opened: usize,
}

impl NetworkState {
    fn ephemeral_port(&mut self) -> u16 {
        if self.next_port < FIRST_EPHEMERAL_PORT {
            self.next_port = FIRST_EPHEMERAL_PORT;
        }
        let port = self.next_port;
        self.next_port = self.next_port.checked_add(1).unwrap_or(FIRST_EPHEMERAL_PORT);
        port
    }

    fn remove_device(&mut self, addr: Ipv4Addr) {
        self.devices.remove(&addr);
        self.listeners.retain(|listen, _| *listen.ip() != addr);
    }
}

/// A shared virtual network that memory devices attach to.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose devices attach to this network.
    pub fn engine(&self) -> MemoryEngine {
        MemoryEngine {
            network: self.clone(),
            fail_open: None,
        }
    }

    /// Number of devices currently attached.
    pub fn device_count(&self) -> usize {
        self.lock().map(|s| s.devices.len()).unwrap_or(0)
    }

    /// Number of devices ever opened.
    pub fn opened_count(&self) -> usize {
        self.lock().map(|s| s.opened).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, NetworkState>> {
        self.state
            .lock()
            .map_err(|_| Error::Engine("memory network state poisoned".to_string()))
    }
}

/// Test engine backed by a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryEngine {
    network: MemoryNetwork,
    fail_open: Option<String>,
}

impl MemoryEngine {
    /// Make every `open` fail with `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.fail_open = Some(reason.into());
        self
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl TunnelEngine for MemoryEngine {
    fn open(&self, params: EngineParams) -> BoxFuture<'_, Result<Box<dyn TunnelDevice>>> {
        Box::pin(async move {
            if let Some(reason) = &self.fail_open {
                return Err(Error::Engine(reason.clone()));
            }
            let mut state = self.network.lock()?;
            if state.devices.contains_key(&params.local_addr) {
                return Err(Error::Engine(format!(
                    "address {} already in use",
                    params.local_addr
                )));
            }
            let public = params.local_key.public_key();
            state.devices.insert(
                params.local_addr,
                DeviceEntry {
                    public,
                    peer: params.remote_key,
                },
            );
            state.opened += 1;
            Ok(Box::new(MemoryDevice {
                network: self.network.clone(),
                local: params.local_addr,
                remote: params.allowed_remote,
                public,
                peer: params.remote_key,
                attached: true,
            }) as Box<dyn TunnelDevice>)
        })
    }
}

struct MemoryDevice {
    network: MemoryNetwork,
    local: Ipv4Addr,
    remote: Ipv4Addr,
    public: PublicKey,
    peer: PublicKey,
    attached: bool,
}

impl MemoryDevice {
    fn detach(&mut self) {
        if self.attached {
            if let Ok(mut state) = self.network.lock() {
                state.remove_device(self.local);
            }
            self.attached = false;
        }
    }
}

impl TunnelDevice for MemoryDevice {
    fn dial<'a>(&'a self, network: &'a str, addr: SocketAddr) -> BoxFuture<'a, Result<Connection>> {
        Box::pin(async move {
            if network != "tcp" && network != "tcp4" {
                return Err(Error::Engine(format!("unsupported network '{network}'")));
            }
            let target = match addr {
                SocketAddr::V4(v4) if *v4.ip() == self.remote => v4,
                _ => return Err(Error::Engine(format!("no route to {addr} through tunnel"))),
            };
            let (sender, source) = {
                let mut state = self.network.lock()?;
                let paired = state
                    .devices
                    .get(&self.remote)
                    .is_some_and(|d| d.peer == self.public && d.public == self.peer);
                if !paired {
                    return Err(Error::Engine(format!(
                        "handshake with {} did not complete",
                        self.remote
                    )));
                }
                let sender = state
                    .listeners
                    .get(&target)
                    .cloned()
                    .ok_or_else(|| Error::Engine(format!("connection to {addr} refused")))?;
                let port = state.ephemeral_port();
                (sender, SocketAddr::V4(SocketAddrV4::new(self.local, port)))
            };
            let (near, far) = tokio::io::duplex(DUPLEX_CAPACITY);
            sender
                .send((far, source))
                .await
                .map_err(|_| Error::Engine(format!("connection to {addr} refused")))?;
            Ok(Box::new(near) as Connection)
        })
    }

    fn listen(&self, port: u16) -> BoxFuture<'_, Result<Box<dyn TunnelListener>>> {
        Box::pin(async move {
            let addr = SocketAddrV4::new(self.local, port);
            let mut state = self.network.lock()?;
            if state.listeners.contains_key(&addr) {
                return Err(Error::Engine(format!("address {addr} already in use")));
            }
            let (tx, rx) = mpsc::channel(16);
            state.listeners.insert(addr, tx);
            Ok(Box::new(MemoryListener {
                network: self.network.clone(),
                addr,
                rx,
            }) as Box<dyn TunnelListener>)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.detach();
            Ok(())
        })
    }
}

impl Drop for MemoryDevice {
    fn drop(&mut self) {
        self.detach();
    }
}

struct MemoryListener {
    network: MemoryNetwork,
    addr: SocketAddrV4,
    rx: mpsc::Receiver<Incoming>,
}

impl TunnelListener for MemoryListener {
    fn accept(&mut self) -> BoxFuture<'_, Result<(Connection, SocketAddr)>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some((conn, peer)) => Ok((Box::new(conn) as Connection, peer)),
                None => Err(Error::Engine(format!("listener on {} closed", self.addr))),
            }
        })
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.addr)
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        if let Ok(mut state) = self.network.lock() {
            state.listeners.remove(&self.addr);
        }
    }
}
