// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Machine configuration management.
//!
//! Configuration is stored in `config.toml` under the syncsh home
//! (`$SYNCSH_HOME`, default `~/.config/syncsh`) and includes:
//! - this machine's id, shell, history file and database location
//! - the WireGuard keypair (the file is kept at mode 0600)
//! - the optional `[peer]` table describing the other machine

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use syncsh_core::link::LinkConfigBuilder;
use syncsh_core::{KeyMaterial, PeerLinkConfig, Role, SecretKey, ShellKind, DEFAULT_SYNC_PORT};

use crate::env;
use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "history.db";
const CONFIG_MODE: u32 = 0o600;

/// Default name of the tunnel interface.
pub const DEFAULT_INTERFACE: &str = "syncsh0";

/// Default WireGuard UDP listen port.
pub const DEFAULT_WG_PORT: u16 = 51820;

/// Machine configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identity stamped on every entry recorded here.
    pub machine_id: String,
    pub shell: ShellKind,
    /// Absolute path of the shell's history file.
    pub history_path: PathBuf,
    pub db_path: PathBuf,
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Base64 WireGuard private key.
    pub private_key: KeyMaterial,
    /// Base64 WireGuard public key, shared with the peer.
    pub public_key: String,
    /// TCP port of the sync service on the tunnel address.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// UDP port the WireGuard device listens on.
    #[serde(default = "default_wg_port")]
    pub wg_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerConfig>,
}

/// The other machine, as recorded by `syncsh pair`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// This machine's role on the link.
    pub role: Role,
    /// Public `<ip>:<port>` of the peer's WireGuard device.
    pub endpoint: String,
    pub public_key: String,
    /// Expected machine id; when set, any other identity is refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive_secs: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
}

fn default_interface() -> String {
    DEFAULT_INTERFACE.to_string()
}

fn default_listen_port() -> u16 {
    DEFAULT_SYNC_PORT
}

fn default_wg_port() -> u16 {
    DEFAULT_WG_PORT
}

impl Config {
    /// A fresh configuration with a newly generated keypair.
    pub fn generate(
        home: &Path,
        machine_id: String,
        shell: ShellKind,
        history_path: PathBuf,
    ) -> Result<Self> {
        let secret = SecretKey::generate();
        let config = Config {
            machine_id,
            shell,
            history_path,
            db_path: home.join(DB_FILE_NAME),
            interface: default_interface(),
            private_key: KeyMaterial::new(secret.to_base64().as_str()),
            public_key: secret.public_key().to_base64(),
            listen_port: default_listen_port(),
            wg_port: default_wg_port(),
            peer: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the given syncsh home.
    pub fn load(home: &Path) -> Result<Self> {
        let path = config_path(home);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotInitialized(path)),
            Err(e) => return Err(Error::Config(format!("failed to read config: {e}"))),
        };
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given syncsh home, readable by the owner only.
    pub fn save(&self, home: &Path) -> Result<()> {
        fs::create_dir_all(home)?;
        let path = config_path(home);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

        // Tighten first so the key never sits in a world-readable file.
        if path.exists() {
            fs::set_permissions(&path, fs::Permissions::from_mode(CONFIG_MODE))?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CONFIG_MODE)
            .open(&path)?;
        std::io::Write::write_all(&mut file, content.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.machine_id.trim().is_empty() || self.machine_id.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "machine_id '{}' must be non-empty and contain no whitespace",
                self.machine_id
            )));
        }
        if self.interface.is_empty() {
            return Err(Error::Config("interface must not be empty".to_string()));
        }
        if !self.history_path.is_absolute() {
            return Err(Error::InvalidHistoryPath {
                path: self.history_path.clone(),
                reason: "must be absolute".to_string(),
            });
        }
        if self.listen_port == 0 {
            return Err(Error::Config("listen_port must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn secret_key(&self) -> Result<SecretKey> {
        Ok(SecretKey::parse(self.private_key.expose(), "local private key")?)
    }

    /// The peer table, or [`Error::NoPeer`].
    pub fn peer(&self) -> Result<&PeerConfig> {
        self.peer.as_ref().ok_or(Error::NoPeer)
    }

    /// Assemble the validated link configuration for the paired peer.
    pub fn link_config(&self) -> Result<PeerLinkConfig> {
        let peer = self.peer()?;
        let mut builder = LinkConfigBuilder::new(peer.role)
            .endpoint(peer.endpoint.as_str())
            .local_private_key(self.private_key.clone())
            .remote_public_key(KeyMaterial::new(peer.public_key.as_str()));
        if let Some(secs) = peer.keepalive_secs {
            builder = builder.keepalive_secs(secs);
        }
        if let Some(mtu) = peer.mtu {
            builder = builder.mtu(mtu);
        }
        Ok(builder.build()?)
    }
}

/// The syncsh home: `$SYNCSH_HOME`, else `<config dir>/syncsh`.
pub fn syncsh_home() -> PathBuf {
    if let Some(dir) = env::syncsh_home() {
        return dir;
    }
    dirs::config_dir()
        .map(|d| d.join("syncsh"))
        .unwrap_or_else(|| PathBuf::from(".config/syncsh"))
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE_NAME)
}

/// Parse a shell name given on the command line.
///
/// The name must match exactly: no surrounding whitespace, lowercase.
pub fn validate_shell(name: &str) -> Result<ShellKind> {
    if name.is_empty() || name.trim() != name {
        return Err(Error::InvalidShell(name.to_string()));
    }
    name.parse::<ShellKind>()
        .map_err(|_| Error::InvalidShell(name.to_string()))
}

/// Guess the shell from a `$SHELL` value such as `/usr/bin/zsh`.
pub fn detect_shell(shell_env: Option<&str>) -> Option<ShellKind> {
    let name = Path::new(shell_env?).file_name()?.to_str()?;
    name.parse::<ShellKind>().ok()
}

/// Where `shell` keeps its history by default.
pub fn default_history_path(shell: ShellKind, home: &Path, histfile: Option<PathBuf>) -> PathBuf {
    match shell {
        ShellKind::Bash => home.join(".bash_history"),
        ShellKind::Zsh => histfile
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| home.join(".zsh_history")),
        ShellKind::Fish => home.join(".local/share/fish/fish_history"),
    }
}

/// Check a history path and create the file empty if it is missing.
pub fn prepare_history_file(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidHistoryPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.is_absolute() {
        return Err(invalid("must be absolute"));
    }
    if path.is_dir() {
        return Err(invalid("is a directory"));
    }
    match path.parent() {
        Some(parent) if parent.is_dir() => {}
        _ => return Err(invalid("parent directory does not exist")),
    }

    let opened = fs::OpenOptions::new().create(true).append(true).open(path);
    match opened {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(invalid("is not writable")),
        Err(e) => Err(invalid(&e.to_string())),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
