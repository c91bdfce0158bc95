// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel interface provisioning.
//!
//! The WireGuard device itself is run by a userspace implementation
//! (`boringtun-cli` unless `SYNCSH_WG_DAEMON` names another) which exposes a
//! UAPI socket. An interface whose socket already exists is reused as is.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use syncsh_core::addr::PREFIX_LEN;
use syncsh_core::tunnel::{UapiEngine, UAPI_SOCKET_DIR};
use tokio::process::Command;
use tracing::{debug, info};

use crate::env;
use crate::error::{Error, Result};

const DEFAULT_DAEMON: &str = "boringtun-cli";
const SOCKET_POLL: Duration = Duration::from_millis(100);
const SOCKET_WAIT: Duration = Duration::from_secs(5);

/// The interface to bring up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub name: String,
    pub address: Ipv4Addr,
    pub mtu: u16,
    /// WireGuard UDP listen port.
    pub listen_port: u16,
}

/// `ip` invocations that configure an interface, in order.
pub fn ip_commands(spec: &InterfaceSpec) -> Vec<Vec<String>> {
    vec![
        vec![
            "addr".to_string(),
            "replace".to_string(),
            format!("{}/{PREFIX_LEN}", spec.address),
            "dev".to_string(),
            spec.name.clone(),
        ],
        vec![
            "link".to_string(),
            "set".to_string(),
            "dev".to_string(),
            spec.name.clone(),
            "mtu".to_string(),
            spec.mtu.to_string(),
            "up".to_string(),
        ],
    ]
}

/// Starts or reuses userspace WireGuard interfaces.
#[derive(Debug, Clone)]
pub struct Provisioner {
    daemon: PathBuf,
    ip: PathBuf,
    socket_dir: PathBuf,
    wait: Duration,
}

impl Provisioner {
    pub fn from_env() -> Self {
        Provisioner {
            daemon: env::wg_daemon().unwrap_or_else(|| PathBuf::from(DEFAULT_DAEMON)),
            ip: PathBuf::from("ip"),
            socket_dir: PathBuf::from(UAPI_SOCKET_DIR),
            wait: SOCKET_WAIT,
        }
    }

    pub fn daemon(mut self, daemon: impl Into<PathBuf>) -> Self {
        self.daemon = daemon.into();
        self
    }

    pub fn ip(mut self, ip: impl Into<PathBuf>) -> Self {
        self.ip = ip.into();
        self
    }

    pub fn socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.socket_dir.join(format!("{name}.sock"))
    }

    /// Return an engine for `spec.name`, creating the interface if needed.
    pub async fn get_or_create_interface(&self, spec: &InterfaceSpec) -> Result<UapiEngine> {
        let socket = self.socket_path(&spec.name);
        if socket.exists() {
            info!(interface = %spec.name, "reusing existing interface");
            return Ok(self.engine(socket, spec));
        }

        info!(interface = %spec.name, daemon = %self.daemon.display(), "starting interface");
        let status = Command::new(&self.daemon)
            .arg(&spec.name)
            .status()
            .await
            .map_err(|e| {
                provision_error(spec, format!("failed to start {}: {e}", self.daemon.display()))
            })?;
        if !status.success() {
            return Err(provision_error(
                spec,
                format!("{} exited with {status}", self.daemon.display()),
            ));
        }

        self.wait_for_socket(&socket, spec).await?;

        for args in ip_commands(spec) {
            debug!(ip = %self.ip.display(), ?args, "configuring interface");
            let status = Command::new(&self.ip)
                .args(&args)
                .status()
                .await
                .map_err(|e| provision_error(spec, format!("failed to run ip: {e}")))?;
            if !status.success() {
                return Err(provision_error(
                    spec,
                    format!("ip {} exited with {status}", args.join(" ")),
                ));
            }
        }

        info!(interface = %spec.name, address = %spec.address, "interface up");
        Ok(self.engine(socket, spec))
    }

    async fn wait_for_socket(&self, socket: &Path, spec: &InterfaceSpec) -> Result<()> {
        let deadline = Instant::now() + self.wait;
        while !socket.exists() {
            if Instant::now() >= deadline {
                return Err(provision_error(
                    spec,
                    format!("daemon did not create {}", socket.display()),
                ));
            }
            tokio::time::sleep(SOCKET_POLL).await;
        }
        Ok(())
    }

    fn engine(&self, socket: PathBuf, spec: &InterfaceSpec) -> UapiEngine {
        UapiEngine::with_socket(socket).listen_port(spec.listen_port)
    }
}

fn provision_error(spec: &InterfaceSpec, reason: String) -> Error {
    Error::Provision {
        interface: spec.name.clone(),
        reason,
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
