// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Secure link lifecycle.
//!
//! The cryptographic work is done by an external engine reached through the
//! [`TunnelEngine`] trait. [`Tunnel`] owns one link: it validates the
//! configuration, parses the keys, opens the engine device, and hands out
//! connections routed through it until [`Tunnel::close`] is called.
//!
//! ```text
//! Idle --connect--> Connecting --ok--> Established --close--> Closed
//!                        |
//!                        +--error--> Idle
//! ```

mod uapi;
pub use uapi::{socket_path, UapiEngine, UAPI_SOCKET_DIR};

#[cfg(any(test, feature = "test-utils"))]
mod memory;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryEngine, MemoryNetwork};

use std::fmt;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::addr::Role;
use crate::error::{Error, Result};
use crate::key::{PublicKey, SecretKey};
use crate::link::PeerLinkConfig;

/// Boxed future returned by the engine traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bidirectional byte stream carried through the tunnel.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// An application-level connection through the tunnel.
pub type Connection = Box<dyn AsyncStream>;

/// Everything the engine needs to bring up a device.
pub struct EngineParams {
    pub local_key: SecretKey,
    pub remote_key: PublicKey,
    pub local_addr: Ipv4Addr,
    /// The single remote host routed through the tunnel (a /32).
    pub allowed_remote: Ipv4Addr,
    pub endpoint: SocketAddr,
    pub keepalive: Duration,
    pub mtu: u16,
}

impl fmt::Debug for EngineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineParams")
            .field("local_key", &self.local_key)
            .field("remote_key", &self.remote_key.to_base64())
            .field("local_addr", &self.local_addr)
            .field("allowed_remote", &self.allowed_remote)
            .field("endpoint", &self.endpoint)
            .field("keepalive", &self.keepalive)
            .field("mtu", &self.mtu)
            .finish()
    }
}

/// External secure-tunnel engine.
pub trait TunnelEngine: Send + Sync {
    /// Create and bring up a device for one link.
    fn open(&self, params: EngineParams) -> BoxFuture<'_, Result<Box<dyn TunnelDevice>>>;
}

/// A live engine device.
pub trait TunnelDevice: Send + Sync {
    /// Open a stream connection to `addr` through the device.
    ///
    /// `network` is `"tcp"` or `"tcp4"`.
    fn dial<'a>(&'a self, network: &'a str, addr: SocketAddr) -> BoxFuture<'a, Result<Connection>>;

    /// Accept stream connections on the device's local address.
    fn listen(&self, port: u16) -> BoxFuture<'_, Result<Box<dyn TunnelListener>>>;

    /// Tear the device down. Called at most once by [`Tunnel`].
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Incoming connections on the tunnel address.
pub trait TunnelListener: Send {
    fn accept(&mut self) -> BoxFuture<'_, Result<(Connection, SocketAddr)>>;

    fn local_addr(&self) -> SocketAddr;
}

/// Lifecycle state of a [`Tunnel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Idle,
    Connecting,
    Established,
    Closed,
}

/// The addresses of an established link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub role: Role,
    pub local: Ipv4Addr,
    pub remote: Ipv4Addr,
    pub endpoint: SocketAddr,
}

/// Owner of one secure link.
///
/// Connect, use and close from a single owner; the handle is not meant to be
/// shared across concurrent connect/close calls.
pub struct Tunnel {
    engine: Arc<dyn TunnelEngine>,
    state: TunnelState,
    device: Option<Box<dyn TunnelDevice>>,
    info: Option<LinkInfo>,
}

impl Tunnel {
    pub fn new(engine: Arc<dyn TunnelEngine>) -> Self {
        Tunnel {
            engine,
            state: TunnelState::Idle,
            device: None,
            info: None,
        }
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == TunnelState::Established
    }

    /// Addresses of the current link, if established.
    pub fn info(&self) -> Option<LinkInfo> {
        self.info
    }

    /// Bring the link up.
    ///
    /// A failed attempt leaves the tunnel `Idle`; nothing is retried.
    pub async fn connect(&mut self, config: &PeerLinkConfig) -> Result<LinkInfo> {
        if self.state == TunnelState::Established || self.state == TunnelState::Connecting {
            return Err(Error::Engine("tunnel is already connected".to_string()));
        }
        config.validate()?;
        let params = engine_params(config)?;
        let info = LinkInfo {
            role: config.role,
            local: params.local_addr,
            remote: params.allowed_remote,
            endpoint: params.endpoint,
        };

        self.state = TunnelState::Connecting;
        debug!(local = %info.local, remote = %info.remote, endpoint = %info.endpoint, "opening tunnel device");
        match self.engine.open(params).await {
            Ok(device) => {
                self.device = Some(device);
                self.info = Some(info);
                self.state = TunnelState::Established;
                info!(role = %info.role, local = %info.local, remote = %info.remote, "tunnel established");
                Ok(info)
            }
            Err(e) => {
                self.state = TunnelState::Idle;
                warn!(error = %e, "tunnel connect failed");
                Err(match e {
                    Error::Engine(_) => e,
                    other => Error::Engine(other.to_string()),
                })
            }
        }
    }

    fn device(&self) -> Result<&dyn TunnelDevice> {
        match (&self.state, &self.device) {
            (TunnelState::Established, Some(device)) => Ok(device.as_ref()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Open a connection through the tunnel.
    pub async fn dial(&self, network: &str, addr: SocketAddr) -> Result<Connection> {
        let device = self.device()?;
        device.dial(network, addr).await
    }

    /// Open a connection to the remote tunnel address on `port`.
    pub async fn dial_peer(&self, port: u16) -> Result<Connection> {
        let info = self.info.ok_or(Error::NotConnected)?;
        self.dial("tcp4", SocketAddr::V4(SocketAddrV4::new(info.remote, port)))
            .await
    }

    /// Listen for connections on the local tunnel address.
    pub async fn listen(&self, port: u16) -> Result<Box<dyn TunnelListener>> {
        let device = self.device()?;
        device.listen(port).await
    }

    /// Tear the link down. Safe to call in any state, any number of times.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        self.state = TunnelState::Closed;
        self.info = None;
        let result = device.close().await;
        info!("tunnel closed");
        result
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if self.device.is_some() {
            warn!("tunnel dropped while established; closing device on drop");
        }
    }
}

/// Parse the configured keys and assemble the engine parameters.
fn engine_params(config: &PeerLinkConfig) -> Result<EngineParams> {
    let (Some(local_addr), Some(remote_addr), Some(endpoint)) =
        (config.local_address, config.remote_address, config.endpoint)
    else {
        return Err(Error::ConfigInvalid {
            field: "link",
            reason: "is incomplete".to_string(),
        });
    };
    let local_key = match &config.local_private_key {
        Some(k) => SecretKey::parse(k.expose(), "local private key")?,
        None => {
            return Err(Error::ConfigInvalid {
                field: "local_private_key",
                reason: "is missing".to_string(),
            })
        }
    };
    let remote_key = match &config.remote_public_key {
        Some(k) => PublicKey::parse(k.expose(), "remote public key")?,
        None => {
            return Err(Error::ConfigInvalid {
                field: "remote_public_key",
                reason: "is missing".to_string(),
            })
        }
    };
    Ok(EngineParams {
        local_key,
        remote_key,
        local_addr,
        allowed_remote: remote_addr,
        endpoint,
        keepalive: config.keepalive(),
        mtu: config.mtu,
    })
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
