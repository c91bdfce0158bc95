// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Peer link configuration.
//!
//! A [`PeerLinkConfig`] carries everything needed to bring up the secure
//! link to the one remote machine. Configurations built through
//! [`LinkConfigBuilder`] are complete by construction; configurations that
//! arrive some other way (deserialized, hand-assembled) are re-checked with
//! [`PeerLinkConfig::is_configured`] before any connection attempt.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::addr::{assign_addresses, is_link_host, Role};
use crate::error::{Error, Result};
use crate::key::KeyMaterial;

/// Default persistent keepalive; works with a wide variety of firewalls.
pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;
/// Default MTU for the tunnel interface.
pub const DEFAULT_MTU: u16 = 1420;
/// Smallest MTU accepted for the tunnel interface.
pub const MIN_MTU: u16 = 576;

fn default_keepalive_secs() -> u16 {
    DEFAULT_KEEPALIVE_SECS
}

fn default_mtu() -> u16 {
    DEFAULT_MTU
}

/// Parameters of the single point-to-point link.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerLinkConfig {
    pub role: Role,
    pub local_address: Option<Ipv4Addr>,
    pub remote_address: Option<Ipv4Addr>,
    pub local_private_key: Option<KeyMaterial>,
    pub remote_public_key: Option<KeyMaterial>,
    pub endpoint: Option<SocketAddr>,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u16,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

impl PeerLinkConfig {
    /// Start building a configuration for `role`.
    pub fn builder(role: Role) -> LinkConfigBuilder {
        LinkConfigBuilder::new(role)
    }

    /// True iff every required field is present and well-formed.
    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check completeness, reporting the first field that fails.
    pub fn validate(&self) -> Result<()> {
        let local = self.local_address.ok_or_else(|| missing("local_address"))?;
        let remote = self.remote_address.ok_or_else(|| missing("remote_address"))?;
        if !is_link_host(local) {
            return Err(invalid("local_address", format!("{local} is outside the link subnet")));
        }
        if !is_link_host(remote) {
            return Err(invalid("remote_address", format!("{remote} is outside the link subnet")));
        }
        let expected = assign_addresses(self.role);
        if local != expected.local || remote != expected.remote {
            return Err(invalid(
                "local_address",
                format!(
                    "{local} -> {remote} does not match the {} assignment {} -> {}",
                    self.role, expected.local, expected.remote
                ),
            ));
        }

        match &self.local_private_key {
            Some(k) if !k.is_blank() => {}
            _ => return Err(missing("local_private_key")),
        }
        match &self.remote_public_key {
            Some(k) if !k.is_blank() => {}
            _ => return Err(missing("remote_public_key")),
        }

        let endpoint = self.endpoint.ok_or_else(|| missing("endpoint"))?;
        check_endpoint(endpoint)
            .map_err(|reason| invalid("endpoint", format!("{endpoint} {reason}")))?;

        if self.mtu < MIN_MTU {
            return Err(invalid("mtu", format!("{} is below {MIN_MTU}", self.mtu)));
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keepalive_secs))
    }

    /// The single host route allowed through the tunnel, in CIDR form.
    pub fn allowed_remote(&self) -> Option<String> {
        self.remote_address.map(|addr| format!("{addr}/32"))
    }
}

fn missing(field: &'static str) -> Error {
    Error::ConfigInvalid {
        field,
        reason: "is missing".to_string(),
    }
}

fn invalid(field: &'static str, reason: String) -> Error {
    Error::ConfigInvalid { field, reason }
}

fn check_endpoint(endpoint: SocketAddr) -> std::result::Result<(), &'static str> {
    if endpoint.port() == 0 {
        return Err("has no port");
    }
    if endpoint.ip().is_unspecified() {
        return Err("has an unspecified address");
    }
    Ok(())
}

/// Parse `<ip>:<port>` into a usable remote endpoint.
pub fn parse_endpoint(text: &str) -> Result<SocketAddr> {
    let endpoint: SocketAddr = text
        .trim()
        .parse()
        .map_err(|_| Error::InvalidEndpoint(text.to_string()))?;
    check_endpoint(endpoint).map_err(|_| Error::InvalidEndpoint(text.to_string()))?;
    Ok(endpoint)
}

/// Builder that only ever yields complete configurations.
#[derive(Debug, Clone)]
pub struct LinkConfigBuilder {
    role: Role,
    endpoint: Option<String>,
    local_private_key: Option<KeyMaterial>,
    remote_public_key: Option<KeyMaterial>,
    keepalive_secs: Option<u16>,
    mtu: Option<u16>,
}

impl LinkConfigBuilder {
    pub fn new(role: Role) -> Self {
        LinkConfigBuilder {
            role,
            endpoint: None,
            local_private_key: None,
            remote_public_key: None,
            keepalive_secs: None,
            mtu: None,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn local_private_key(mut self, key: KeyMaterial) -> Self {
        self.local_private_key = Some(key);
        self
    }

    pub fn remote_public_key(mut self, key: KeyMaterial) -> Self {
        self.remote_public_key = Some(key);
        self
    }

    /// Persistent keepalive in seconds; 0 disables it.
    pub fn keepalive_secs(mut self, secs: u16) -> Self {
        self.keepalive_secs = Some(secs);
        self
    }

    pub fn mtu(mut self, mtu: u16) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Validate and assemble the configuration.
    pub fn build(self) -> Result<PeerLinkConfig> {
        let endpoint = match self.endpoint.as_deref() {
            Some(text) if !text.trim().is_empty() => parse_endpoint(text)?,
            _ => return Err(missing("endpoint")),
        };
        let addrs = assign_addresses(self.role);

        let config = PeerLinkConfig {
            role: self.role,
            local_address: Some(addrs.local),
            remote_address: Some(addrs.remote),
            local_private_key: self.local_private_key,
            remote_public_key: self.remote_public_key,
            endpoint: Some(endpoint),
            keepalive_secs: self.keepalive_secs.unwrap_or(DEFAULT_KEEPALIVE_SECS),
            mtu: self.mtu.unwrap_or(DEFAULT_MTU),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Build a link configuration with default keepalive and MTU.
pub fn build_config(
    role: Role,
    endpoint: &str,
    local_private_key: KeyMaterial,
    remote_public_key: KeyMaterial,
) -> Result<PeerLinkConfig> {
    LinkConfigBuilder::new(role)
        .endpoint(endpoint)
        .local_private_key(local_private_key)
        .remote_public_key(remote_public_key)
        .build()
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
