// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use syncsh_core::{assign_addresses, parse_endpoint, PublicKey, Role};

use crate::config::{syncsh_home, Config, PeerConfig};
use crate::error::{Error, Result};

/// What `syncsh pair` was asked for.
#[derive(Debug, Clone)]
pub struct PairOptions {
    pub role: Role,
    pub endpoint: String,
    pub public_key: String,
    pub machine_id: Option<String>,
    pub keepalive_secs: Option<u16>,
    pub mtu: Option<u16>,
}

pub fn run(options: PairOptions) -> Result<()> {
    let home = syncsh_home();
    let config = run_impl(&home, options)?;
    let Some(peer) = &config.peer else {
        return Err(Error::NoPeer);
    };

    let addrs = assign_addresses(peer.role);
    println!("Paired as {} via {}", peer.role, peer.endpoint);
    println!("Link: {} -> {}", addrs.local, addrs.remote);
    if let Some(id) = &peer.machine_id {
        println!("Peer machine: {id}");
    }
    println!(
        "On the peer: syncsh pair --role {} --endpoint <this-host>:{} --public-key {}",
        peer.role.peer(),
        config.wg_port,
        config.public_key
    );
    Ok(())
}

/// Internal implementation that accepts the home for testing.
pub(crate) fn run_impl(home: &Path, options: PairOptions) -> Result<Config> {
    let mut config = Config::load(home)?;

    let endpoint = parse_endpoint(options.endpoint.trim())?;
    let public_key = PublicKey::parse(&options.public_key, "remote public key")?;
    if public_key.to_base64() == config.public_key {
        return Err(Error::Config(
            "the peer public key is this machine's own key\n  hint: use the key printed by 'syncsh key' on the other machine".to_string(),
        ));
    }
    if options.machine_id.as_deref() == Some(config.machine_id.as_str()) {
        return Err(Error::Config(format!(
            "peer machine id '{}' is this machine's own id",
            config.machine_id
        )));
    }

    config.peer = Some(PeerConfig {
        role: options.role,
        endpoint: endpoint.to_string(),
        public_key: public_key.to_base64(),
        machine_id: options.machine_id,
        keepalive_secs: options.keepalive_secs,
        mtu: options.mtu,
    });
    config.link_config()?;
    config.save(home)?;
    Ok(config)
}

#[cfg(test)]
#[path = "pair_tests.rs"]
mod tests;
