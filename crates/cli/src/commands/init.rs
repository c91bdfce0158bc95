// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use rand::Rng;
use syncsh_core::{Database, ShellKind};

use crate::config::{
    config_path, default_history_path, detect_shell, prepare_history_file, syncsh_home,
    validate_shell, Config,
};
use crate::env;
use crate::error::{Error, Result};

/// What `syncsh init` was asked for.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub shell: Option<String>,
    pub history_path: Option<PathBuf>,
    pub interface: Option<String>,
    pub machine_id: Option<String>,
}

/// Ambient inputs used for defaults.
#[derive(Debug, Clone)]
pub struct InitEnv {
    pub user_home: PathBuf,
    pub shell: Option<String>,
    pub histfile: Option<PathBuf>,
    pub hostname: Option<String>,
}

impl InitEnv {
    pub fn from_env() -> Result<Self> {
        let user_home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine the home directory".to_string()))?;
        Ok(InitEnv {
            user_home,
            shell: env::login_shell(),
            histfile: env::histfile(),
            hostname: read_hostname(),
        })
    }
}

pub fn run(options: InitOptions) -> Result<()> {
    let home = syncsh_home();
    let config = run_impl(&home, options, &InitEnv::from_env()?)?;

    println!("Initialized syncsh at {}", home.display());
    println!("Machine: {}", config.machine_id);
    println!("Shell: {} ({})", config.shell, config.history_path.display());
    println!("Public key: {}", config.public_key);
    Ok(())
}

/// Internal implementation that accepts the home and environment for testing.
pub(crate) fn run_impl(home: &Path, options: InitOptions, init_env: &InitEnv) -> Result<Config> {
    let path = config_path(home);
    if path.exists() {
        return Err(Error::AlreadyInitialized(path));
    }

    let shell = resolve_shell(options.shell.as_deref(), init_env.shell.as_deref())?;
    let history_path = options.history_path.unwrap_or_else(|| {
        default_history_path(shell, &init_env.user_home, init_env.histfile.clone())
    });
    prepare_history_file(&history_path)?;

    let machine_id = options
        .machine_id
        .or_else(|| init_env.hostname.clone())
        .unwrap_or_else(random_machine_id);

    let mut config = Config::generate(home, machine_id, shell, history_path)?;
    if let Some(interface) = options.interface {
        config.interface = interface;
    }
    config.validate()?;
    config.save(home)?;
    Database::open(&config.db_path)?;
    Ok(config)
}

fn resolve_shell(given: Option<&str>, shell_env: Option<&str>) -> Result<ShellKind> {
    match given {
        Some(name) => validate_shell(name),
        None => detect_shell(shell_env)
            .ok_or_else(|| Error::InvalidShell(shell_env.unwrap_or_default().to_string())),
    }
}

fn read_hostname() -> Option<String> {
    let name = std::fs::read_to_string("/etc/hostname").ok()?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        None
    } else {
        Some(name.to_string())
    }
}

fn random_machine_id() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    format!("machine-{}", hex::encode(bytes))
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
