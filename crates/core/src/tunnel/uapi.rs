// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine backed by a userspace WireGuard daemon.
//!
//! boringtun and wireguard-go both expose the cross-platform configuration
//! protocol on `/var/run/wireguard/<interface>.sock`: newline-separated
//! `key=value` pairs terminated by a blank line, answered with `errno=N`.
//! Packets then flow through the kernel interface, so connections are plain
//! TCP sockets bound to the tunnel address.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, UnixStream};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{BoxFuture, Connection, EngineParams, TunnelDevice, TunnelEngine, TunnelListener};
use crate::error::{Error, Result};

/// Directory userspace WireGuard implementations put their sockets in.
pub const UAPI_SOCKET_DIR: &str = "/var/run/wireguard";

/// Control socket path for `interface`.
pub fn socket_path(interface: &str) -> PathBuf {
    Path::new(UAPI_SOCKET_DIR).join(format!("{interface}.sock"))
}

/// Configures an existing userspace WireGuard interface over its UAPI socket.
#[derive(Debug, Clone)]
pub struct UapiEngine {
    socket: PathBuf,
    listen_port: Option<u16>,
}

impl UapiEngine {
    pub fn new(interface: &str) -> Self {
        Self::with_socket(socket_path(interface))
    }

    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        UapiEngine {
            socket: socket.into(),
            listen_port: None,
        }
    }

    /// UDP port the interface listens on for the peer's handshakes.
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }
}

/// Render the `set` request that installs the single peer.
pub(crate) fn render_set(params: &EngineParams, listen_port: Option<u16>) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::from("set=1\n"));
    let _ = writeln!(out, "private_key={}", params.local_key.to_hex().as_str());
    if let Some(port) = listen_port {
        let _ = writeln!(out, "listen_port={port}");
    }
    out.push_str("replace_peers=true\n");
    let _ = writeln!(out, "public_key={}", params.remote_key.to_hex());
    let _ = writeln!(out, "endpoint={}", params.endpoint);
    let _ = writeln!(out, "persistent_keepalive_interval={}", params.keepalive.as_secs());
    out.push_str("replace_allowed_ips=true\n");
    let _ = writeln!(out, "allowed_ip={}/32", params.allowed_remote);
    out.push('\n');
    out
}

fn render_remove(peer_hex: &str) -> String {
    format!("set=1\npublic_key={peer_hex}\nremove=true\n\n")
}

/// Extract the status from a UAPI reply.
pub(crate) fn parse_errno(reply: &str) -> Result<()> {
    let value = reply
        .lines()
        .find_map(|line| line.strip_prefix("errno="))
        .ok_or_else(|| Error::Engine("malformed reply from wireguard daemon".to_string()))?;
    match value.trim().parse::<i32>() {
        Ok(0) => Ok(()),
        Ok(n) => Err(Error::Engine(format!("wireguard daemon rejected configuration (errno={n})"))),
        Err(_) => Err(Error::Engine(format!("malformed errno '{value}' from wireguard daemon"))),
    }
}

async fn request(socket: &Path, body: &str) -> Result<()> {
    let stream = UnixStream::connect(socket).await.map_err(|e| {
        Error::Engine(format!(
            "cannot reach wireguard daemon at {}: {e}",
            socket.display()
        ))
    })?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(body.as_bytes())
        .await
        .map_err(|e| Error::Engine(format!("write to {}: {e}", socket.display())))?;

    let mut reader = BufReader::new(read);
    let mut reply = String::new();
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Engine(format!("read from {}: {e}", socket.display())))?;
        if n == 0 || line == "\n" {
            break;
        }
        reply.push_str(&line);
    }
    parse_errno(&reply)
}

impl TunnelEngine for UapiEngine {
    fn open(&self, params: EngineParams) -> BoxFuture<'_, Result<Box<dyn TunnelDevice>>> {
        Box::pin(async move {
            debug!(socket = %self.socket.display(), mtu = params.mtu, "configuring wireguard peer");
            let body = render_set(&params, self.listen_port);
            request(&self.socket, &body).await?;
            Ok(Box::new(UapiDevice {
                socket: self.socket.clone(),
                local: params.local_addr,
                remote: params.allowed_remote,
                peer_hex: params.remote_key.to_hex(),
                configured: true,
            }) as Box<dyn TunnelDevice>)
        })
    }
}

struct UapiDevice {
    socket: PathBuf,
    local: Ipv4Addr,
    remote: Ipv4Addr,
    peer_hex: String,
    configured: bool,
}

impl TunnelDevice for UapiDevice {
    fn dial<'a>(&'a self, network: &'a str, addr: SocketAddr) -> BoxFuture<'a, Result<Connection>> {
        Box::pin(async move {
            if network != "tcp" && network != "tcp4" {
                return Err(Error::Engine(format!("unsupported network '{network}'")));
            }
            if addr.ip() != self.remote {
                return Err(Error::Engine(format!("no route to {addr} through tunnel")));
            }
            let socket = TcpSocket::new_v4()
                .map_err(|e| Error::Engine(format!("create socket: {e}")))?;
            socket
                .bind(SocketAddr::new(self.local.into(), 0))
                .map_err(|e| Error::Engine(format!("bind {}: {e}", self.local)))?;
            let stream = socket
                .connect(addr)
                .await
                .map_err(|e| Error::Engine(format!("dial {addr}: {e}")))?;
            Ok(Box::new(stream) as Connection)
        })
    }

    fn listen(&self, port: u16) -> BoxFuture<'_, Result<Box<dyn TunnelListener>>> {
        Box::pin(async move {
            let listener = TcpListener::bind((self.local, port))
                .await
                .map_err(|e| Error::Engine(format!("listen on {}:{port}: {e}", self.local)))?;
            Ok(Box::new(UapiListener { listener }) as Box<dyn TunnelListener>)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.configured {
                return Ok(());
            }
            self.configured = false;
            request(&self.socket, &render_remove(&self.peer_hex)).await
        })
    }
}

impl Drop for UapiDevice {
    fn drop(&mut self) {
        if !self.configured {
            return;
        }
        use std::io::Write;
        let removed = std::os::unix::net::UnixStream::connect(&self.socket)
            .and_then(|mut s| s.write_all(render_remove(&self.peer_hex).as_bytes()));
        if let Err(e) = removed {
            warn!(error = %e, "could not remove wireguard peer on drop");
        }
    }
}

struct UapiListener {
    listener: TcpListener,
}

impl TunnelListener for UapiListener {
    fn accept(&mut self) -> BoxFuture<'_, Result<(Connection, SocketAddr)>> {
        Box::pin(async move {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Engine(format!("accept: {e}")))?;
            Ok((Box::new(stream) as Connection, peer))
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)))
    }
}

#[cfg(test)]
#[path = "uapi_tests.rs"]
mod tests;
