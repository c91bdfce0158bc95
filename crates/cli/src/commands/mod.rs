// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod connect;
pub mod forget;
pub mod import;
pub mod init;
pub mod key;
pub mod log;
pub mod pair;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use syncsh_core::{assign_addresses, Database, Tunnel};
use tracing::warn;

use crate::config::{syncsh_home, Config};
use crate::error::Result;
use crate::provision::{InterfaceSpec, Provisioner};

/// Helper to load the config from the syncsh home.
pub fn load() -> Result<(Config, PathBuf)> {
    let home = syncsh_home();
    let config = Config::load(&home)?;
    Ok((config, home))
}

/// Helper to open the history database named by `config`.
pub fn open_db(config: &Config) -> Result<Database> {
    Ok(Database::open(&config.db_path)?)
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

/// Provision the interface and establish the link to the paired peer.
pub(crate) async fn bring_up(config: &Config, provisioner: &Provisioner) -> Result<Tunnel> {
    let link = config.link_config()?;
    let spec = InterfaceSpec {
        name: config.interface.clone(),
        address: assign_addresses(link.role).local,
        mtu: link.mtu,
        listen_port: config.wg_port,
    };
    let engine = provisioner.get_or_create_interface(&spec).await?;
    let mut tunnel = Tunnel::new(Arc::new(engine));
    tunnel.connect(&link).await?;
    Ok(tunnel)
}

/// Close the tunnel, keeping `result` as the outcome.
pub(crate) async fn close_after<T>(tunnel: &mut Tunnel, result: Result<T>) -> Result<T> {
    let closed = tunnel.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "tunnel close failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;
