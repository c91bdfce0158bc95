// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! syncsh-core: Shared library for the syncsh history sync tool
//!
//! This crate provides the history store, shell parsers, peer-link
//! configuration, the tunnel abstraction, and the sync protocol used by
//! the syncsh CLI.

pub mod addr;
pub mod db;
pub mod entry;
pub mod error;
pub mod key;
pub mod link;
pub mod parser;
pub mod protocol;
pub mod sync;
pub mod tunnel;

pub use addr::{assign_addresses, LinkAddresses, Role};
pub use db::{Database, FileMark, ListFilter, Scope, SeenUpdate, SyncCursor};
pub use entry::{compute_hash, HistoryEntry};
pub use error::{Error, Result};
pub use key::{KeyMaterial, PublicKey, SecretKey};
pub use link::{build_config, parse_endpoint, PeerLinkConfig};
pub use parser::{ParsedLine, ShellKind, ShellParser};
pub use sync::{PeerClient, PeerSource, RoundReport, SyncNode, DEFAULT_SYNC_PORT};
pub use tunnel::{LinkInfo, Tunnel, TunnelEngine, TunnelState};
