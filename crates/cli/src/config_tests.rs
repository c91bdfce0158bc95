// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

fn sample(home: &Path) -> Config {
    Config::generate(
        home,
        "laptop".to_string(),
        ShellKind::Zsh,
        home.join("zsh_history"),
    )
    .unwrap()
}

fn peer(role: Role, public_key: String) -> PeerConfig {
    PeerConfig {
        role,
        endpoint: "203.0.113.7:51820".to_string(),
        public_key,
        machine_id: Some("desktop".to_string()),
        keepalive_secs: None,
        mtu: None,
    }
}

#[test]
fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = sample(temp.path());
    config.save(temp.path()).unwrap();

    let loaded = Config::load(temp.path()).unwrap();
    assert_eq!(loaded.machine_id, "laptop");
    assert_eq!(loaded.shell, ShellKind::Zsh);
    assert_eq!(loaded.interface, DEFAULT_INTERFACE);
    assert_eq!(loaded.listen_port, DEFAULT_SYNC_PORT);
    assert_eq!(loaded.wg_port, DEFAULT_WG_PORT);
    assert_eq!(loaded.private_key.expose(), config.private_key.expose());
    assert_eq!(loaded.public_key, config.public_key);
    assert!(loaded.peer.is_none());
}

#[test]
fn test_config_file_is_owner_only() {
    let temp = TempDir::new().unwrap();
    sample(temp.path()).save(temp.path()).unwrap();

    let mode = fs::metadata(config_path(temp.path()))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_save_tightens_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = config_path(temp.path());
    fs::write(&path, "").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    sample(temp.path()).save(temp.path()).unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_load_missing_is_not_initialized() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(temp.path()).unwrap_err();
    assert!(matches!(err, Error::NotInitialized(_)), "{err}");
}

#[test]
fn test_load_rejects_unknown_shell() {
    let temp = TempDir::new().unwrap();
    let mut text = toml::to_string_pretty(&sample(temp.path())).unwrap();
    text = text.replace("shell = \"zsh\"", "shell = \"tcsh\"");
    fs::write(config_path(temp.path()), text).unwrap();

    let err = Config::load(temp.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"), "{err}");
}

#[test]
fn test_defaults_fill_optional_fields() {
    let temp = TempDir::new().unwrap();
    let text = format!(
        "machine_id = \"m1\"\nshell = \"bash\"\nhistory_path = \"/tmp/h\"\ndb_path = \"/tmp/db\"\nprivate_key = \"{}\"\npublic_key = \"x\"\n",
        SecretKey::generate().to_base64().as_str()
    );
    fs::write(config_path(temp.path()), text).unwrap();

    let config = Config::load(temp.path()).unwrap();
    assert_eq!(config.interface, "syncsh0");
    assert_eq!(config.listen_port, 7423);
    assert_eq!(config.wg_port, 51820);
}

#[parameterized(
    empty = { "" },
    spaced = { "my laptop" },
)]
fn test_bad_machine_id_rejected(machine_id: &str) {
    let temp = TempDir::new().unwrap();
    let mut config = sample(temp.path());
    config.machine_id = machine_id.to_string();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_peer_table_round_trips() {
    let temp = TempDir::new().unwrap();
    let mut config = sample(temp.path());
    let other = SecretKey::generate().public_key().to_base64();
    config.peer = Some(peer(Role::Initiator, other.clone()));
    config.save(temp.path()).unwrap();

    let loaded = Config::load(temp.path()).unwrap();
    let p = loaded.peer().unwrap();
    assert_eq!(p.role, Role::Initiator);
    assert_eq!(p.public_key, other);
    assert_eq!(p.machine_id.as_deref(), Some("desktop"));
}

#[test]
fn test_link_config_requires_peer() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(sample(temp.path()).link_config(), Err(Error::NoPeer)));
}

#[test]
fn test_link_config_from_peer() {
    let temp = TempDir::new().unwrap();
    let mut config = sample(temp.path());
    let other = SecretKey::generate().public_key().to_base64();
    config.peer = Some(PeerConfig {
        mtu: Some(1380),
        ..peer(Role::Responder, other)
    });

    let link = config.link_config().unwrap();
    assert_eq!(link.role, Role::Responder);
    assert_eq!(link.mtu, 1380);
    assert_eq!(link.allowed_remote().as_deref(), Some("10.100.0.1/32"));
}

#[test]
fn test_link_config_reports_bad_endpoint() {
    let temp = TempDir::new().unwrap();
    let mut config = sample(temp.path());
    config.peer = Some(PeerConfig {
        endpoint: "nowhere".to_string(),
        ..peer(Role::Initiator, "k".to_string())
    });
    assert!(matches!(config.link_config(), Err(Error::Core(_))));
}

#[parameterized(
    bash = { "bash", ShellKind::Bash },
    zsh = { "zsh", ShellKind::Zsh },
    fish = { "fish", ShellKind::Fish },
)]
fn test_validate_shell_accepts(name: &str, kind: ShellKind) {
    assert_eq!(validate_shell(name).unwrap(), kind);
}

#[parameterized(
    empty = { "" },
    leading_space = { " bash" },
    trailing_space = { "zsh " },
    capitalized = { "Fish" },
    unknown = { "csh" },
)]
fn test_validate_shell_rejects(name: &str) {
    assert!(matches!(validate_shell(name), Err(Error::InvalidShell(_))));
}

#[parameterized(
    zsh_path = { Some("/usr/bin/zsh"), Some(ShellKind::Zsh) },
    bash_path = { Some("/bin/bash"), Some(ShellKind::Bash) },
    fish_bare = { Some("fish"), Some(ShellKind::Fish) },
    unknown = { Some("/bin/dash"), None },
    unset = { None, None },
)]
fn test_detect_shell(shell_env: Option<&str>, expected: Option<ShellKind>) {
    assert_eq!(detect_shell(shell_env), expected);
}

#[test]
fn test_default_history_paths() {
    let home = Path::new("/home/u");
    assert_eq!(
        default_history_path(ShellKind::Bash, home, None),
        PathBuf::from("/home/u/.bash_history")
    );
    assert_eq!(
        default_history_path(ShellKind::Zsh, home, None),
        PathBuf::from("/home/u/.zsh_history")
    );
    assert_eq!(
        default_history_path(ShellKind::Zsh, home, Some(PathBuf::from("/data/zhist"))),
        PathBuf::from("/data/zhist")
    );
    assert_eq!(
        default_history_path(ShellKind::Fish, home, None),
        PathBuf::from("/home/u/.local/share/fish/fish_history")
    );
}

#[test]
fn test_prepare_history_file_creates_missing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bash_history");
    prepare_history_file(&path).unwrap();
    assert!(path.is_file());
    assert_eq!(fs::read(&path).unwrap().len(), 0);
}

#[test]
fn test_prepare_history_file_keeps_existing_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bash_history");
    fs::write(&path, "ls\n").unwrap();
    prepare_history_file(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "ls\n");
}

#[test]
fn test_prepare_history_file_rejections() {
    let temp = TempDir::new().unwrap();
    let cases = [
        (PathBuf::from("relative/history"), "absolute"),
        (temp.path().to_path_buf(), "directory"),
        (temp.path().join("missing/history"), "parent"),
    ];
    for (path, reason) in cases {
        let err = prepare_history_file(&path).unwrap_err();
        assert!(err.to_string().contains(reason), "{err}");
    }
}
