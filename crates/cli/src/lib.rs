// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! syncshrs - shell history sync between two machines.
//!
//! This crate provides the `syncsh` CLI: it records commands from the local
//! shell history file into a SQLite store and exchanges them with one paired
//! peer over a point-to-point WireGuard tunnel.
//!
//! # Main Components
//!
//! - [`Config`] - Per-machine identity, keys and peer settings (`config.toml`)
//! - [`ingest`] - Incremental import of the shell history file
//! - [`provision`] - Bringing up the userspace WireGuard interface
//! - [`Error`] - Error types for all operations

mod cli;
mod commands;
mod env;
mod watch;

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod provision;

pub use cli::{Cli, Command, LimitArgs, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};

use commands::init::InitOptions;
use commands::pair::PairOptions;

/// Run one parsed command.
pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init {
            shell,
            history_path,
            interface,
            machine_id,
        } => commands::init::run(InitOptions {
            shell,
            history_path,
            interface,
            machine_id,
        }),
        Command::Pair {
            role,
            endpoint,
            public_key,
            machine_id,
            keepalive,
            mtu,
        } => commands::pair::run(PairOptions {
            role,
            endpoint,
            public_key,
            machine_id,
            keepalive_secs: keepalive,
            mtu,
        }),
        Command::Key => commands::key::run(),
        Command::Import => commands::import::run(),
        Command::Log {
            machine,
            since,
            limits,
            output,
        } => commands::log::run(machine, since, limits.resolve(), output),
        Command::Status { output } => commands::status::run(output),
        Command::Forget { hash } => commands::forget::run(&hash),
        Command::Sync => commands::sync::run(),
        Command::Connect { interval } => commands::connect::run(interval),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
