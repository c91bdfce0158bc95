// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed tunnel addressing for a two-machine link.
//!
//! There is exactly one link per machine, so addresses are not negotiated:
//! the initiator always owns `.1` and the responder `.2` of a reserved /30.
//! Supporting several simultaneous peers would need an allocator here.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Network address of the reserved point-to-point subnet.
pub const NETWORK: Ipv4Addr = Ipv4Addr::new(10, 100, 0, 0);
/// Prefix length of the reserved subnet.
pub const PREFIX_LEN: u8 = 30;
/// Host address owned by the initiator.
pub const INITIATOR_ADDR: Ipv4Addr = Ipv4Addr::new(10, 100, 0, 1);
/// Host address owned by the responder.
pub const RESPONDER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 100, 0, 2);

/// Which end of the link this machine is. Fixed for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Maps the legacy boolean flag onto a role.
    pub fn from_initiator(is_initiator: bool) -> Self {
        if is_initiator {
            Role::Initiator
        } else {
            Role::Responder
        }
    }

    /// The role of the machine on the other end.
    pub fn peer(self) -> Self {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initiator" => Ok(Role::Initiator),
            "responder" => Ok(Role::Responder),
            _ => Err(Error::ConfigInvalid {
                field: "role",
                reason: format!("'{s}' is not one of: initiator, responder"),
            }),
        }
    }
}

/// The local/remote host address pair for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddresses {
    pub local: Ipv4Addr,
    pub remote: Ipv4Addr,
}

/// Returns the fixed address pair for `role`.
pub fn assign_addresses(role: Role) -> LinkAddresses {
    match role {
        Role::Initiator => LinkAddresses {
            local: INITIATOR_ADDR,
            remote: RESPONDER_ADDR,
        },
        Role::Responder => LinkAddresses {
            local: RESPONDER_ADDR,
            remote: INITIATOR_ADDR,
        },
    }
}

/// True if `addr` is one of the two usable hosts of the reserved subnet.
pub fn is_link_host(addr: Ipv4Addr) -> bool {
    addr == INITIATOR_ADDR || addr == RESPONDER_ADDR
}

#[cfg(test)]
#[path = "addr_tests.rs"]
mod tests;
