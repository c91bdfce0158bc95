// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use syncsh_core::Role;

pub use args::{LimitArgs, DEFAULT_LOG_LIMIT};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "syncsh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep shell history in sync between two machines over a private tunnel")]
#[command(
    long_about = "Keep shell history in sync between two machines over a private tunnel.\n\n\
    Each machine records its own commands and pulls the other's through a \
    point-to-point WireGuard link."
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the config, keypair and history database for this machine
    #[command(after_help = "\
Examples:
  syncsh init                          Detect the shell from $SHELL
  syncsh init --shell zsh              Use zsh and its default history file
  syncsh init --machine-id laptop      Name this machine explicitly")]
    Init {
        /// Shell whose history to record (bash, zsh, fish)
        #[arg(long)]
        shell: Option<String>,

        /// Absolute path of the history file (default depends on the shell)
        #[arg(long)]
        history_path: Option<PathBuf>,

        /// Tunnel interface name
        #[arg(long, value_parser = non_empty_string)]
        interface: Option<String>,

        /// Identity stamped on entries recorded here (default: hostname)
        #[arg(long, value_parser = non_empty_string)]
        machine_id: Option<String>,
    },

    /// Record the other machine as this machine's peer
    #[command(after_help = "\
Examples:
  syncsh pair --role initiator --endpoint 203.0.113.7:51820 --public-key <KEY>
  syncsh pair --role responder --endpoint 198.51.100.2:51820 --public-key <KEY> --machine-id laptop")]
    Pair {
        /// This machine's end of the link (initiator, responder)
        #[arg(long, value_parser = parse_role)]
        role: Role,

        /// Peer's public WireGuard endpoint as <ip>:<port>
        #[arg(long)]
        endpoint: String,

        /// Peer's base64 public key (see `syncsh key` on the peer)
        #[arg(long)]
        public_key: String,

        /// Peer's machine id; other identities are refused when set
        #[arg(long, value_parser = non_empty_string)]
        machine_id: Option<String>,

        /// Persistent keepalive in seconds (0 disables)
        #[arg(long)]
        keepalive: Option<u16>,

        /// Tunnel MTU
        #[arg(long)]
        mtu: Option<u16>,
    },

    /// Print this machine's public key
    Key,

    /// Import new lines from the history file once
    Import,

    /// Show recorded history, newest first
    #[command(after_help = "\
Examples:
  syncsh log                           Last 100 entries from both machines
  syncsh log --machine desktop -n 20   Last 20 entries recorded on desktop
  syncsh log --since 1700000000 -o json")]
    Log {
        /// Only entries recorded on this machine
        #[arg(long, short)]
        machine: Option<String>,

        /// Only entries after this Unix timestamp
        #[arg(long, short)]
        since: Option<i64>,

        #[command(flatten)]
        limits: LimitArgs,

        /// Output format
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show identity, peer, link addresses and sync progress
    Status {
        /// Output format
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Delete one entry by hash
    #[command(arg_required_else_help = true)]
    Forget {
        /// Hash shown by `syncsh log -o json`
        hash: String,
    },

    /// Bring up the tunnel, pull once from the peer, and close
    Sync,

    /// Stay connected: serve the peer and pull whenever history changes
    Connect {
        /// Seconds between periodic pulls
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}
