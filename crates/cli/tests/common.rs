// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A fresh user home with a syncsh home under it.
pub struct Home {
    pub temp: TempDir,
}

impl Home {
    pub fn new() -> Self {
        Home {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn syncsh_home(&self) -> PathBuf {
        self.path().join("syncsh")
    }

    pub fn history(&self) -> PathBuf {
        self.path().join(".zsh_history")
    }

    /// `syncsh` with the environment pointed at this home.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("syncsh");
        cmd.env("SYNCSH_HOME", self.syncsh_home())
            .env("HOME", self.path())
            .env("SHELL", "/bin/zsh")
            .env_remove("HISTFILE")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn append_history(&self, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history())
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    /// The public key printed by `syncsh key`.
    pub fn public_key(&self) -> String {
        let output = self.cmd().arg("key").output().unwrap();
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// A home initialized as `machine_id` with zsh history.
pub fn init_home(machine_id: &str) -> Home {
    let home = Home::new();
    home.cmd()
        .args(["init", "--machine-id", machine_id])
        .assert()
        .success();
    home
}
