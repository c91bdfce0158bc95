// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shell history file parsers.
//!
//! Parsers are fed one line at a time and may carry state between lines
//! (bash timestamps precede their command, fish records span several lines,
//! zsh continues multi-line commands with a trailing backslash).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// Pre-compiled patterns for the history formats.
// Hard-coded and known-valid, so construction cannot fail.
static ZSH_EXTENDED_RE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^: (\d+):(\d+);(.*)$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static BASH_TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"^#(\d+)$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static FISH_CMD_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"^- cmd: (.*)$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});
static FISH_WHEN_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"^\s+when: (\d+)$") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});

/// Supported shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    Bash,
    Zsh,
    Fish,
}

impl ShellKind {
    pub const ALL: [ShellKind; 3] = [ShellKind::Bash, ShellKind::Zsh, ShellKind::Fish];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Zsh => "zsh",
            ShellKind::Fish => "fish",
        }
    }

    /// A fresh parser for this shell's history format.
    pub fn parser(&self) -> Box<dyn ShellParser> {
        match self {
            ShellKind::Bash => Box::new(BashParser::default()),
            ShellKind::Zsh => Box::new(ZshParser::default()),
            ShellKind::Fish => Box::new(FishParser::default()),
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShellKind {
    type Err = Error;

    /// Exact, case-sensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(ShellKind::Bash),
            "zsh" => Ok(ShellKind::Zsh),
            "fish" => Ok(ShellKind::Fish),
            _ => Err(Error::ConfigInvalid {
                field: "shell",
                reason: format!("'{s}' is not one of: bash, zsh, fish"),
            }),
        }
    }
}

/// Result of feeding one line to a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A complete command. `timestamp` is absent when the format has none.
    Command {
        command: String,
        timestamp: Option<i64>,
        duration: i64,
    },
    /// Line consumed; the command is not complete yet.
    Pending,
    /// Line intentionally excluded (blank, private, or format noise).
    Skip,
}

impl ParsedLine {
    fn command(command: impl Into<String>, timestamp: Option<i64>, duration: i64) -> Self {
        ParsedLine::Command {
            command: command.into(),
            timestamp,
            duration,
        }
    }
}

/// Line-at-a-time history parser.
pub trait ShellParser: Send {
    fn kind(&self) -> ShellKind;

    /// Feed one line, without its trailing newline.
    fn parse_line(&mut self, raw: &str) -> ParsedLine;

    /// True when no partially-read command is buffered.
    fn is_idle(&self) -> bool;
}

/// Blank lines and lines starting with whitespace are private.
fn is_private(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(char::is_whitespace)
}

/// zsh, plain or `EXTENDED_HISTORY` (`: <start>:<elapsed>;<command>`).
#[derive(Debug, Default)]
pub struct ZshParser {
    pending: Option<(String, Option<i64>, i64)>,
}

impl ShellParser for ZshParser {
    fn kind(&self) -> ShellKind {
        ShellKind::Zsh
    }

    fn parse_line(&mut self, raw: &str) -> ParsedLine {
        let line = raw.trim_end_matches('\r');

        if let Some((mut command, timestamp, duration)) = self.pending.take() {
            command.push('\n');
            return match line.strip_suffix('\\') {
                Some(head) => {
                    command.push_str(head);
                    self.pending = Some((command, timestamp, duration));
                    ParsedLine::Pending
                }
                None => {
                    command.push_str(line);
                    ParsedLine::command(command, timestamp, duration)
                }
            };
        }

        if is_private(line) {
            return ParsedLine::Skip;
        }

        let (command, timestamp, duration) = match ZSH_EXTENDED_RE.captures(line) {
            Some(caps) => {
                let timestamp = caps[1].parse::<i64>().ok();
                let duration = caps[2].parse::<i64>().unwrap_or(0);
                (caps[3].to_string(), timestamp, duration)
            }
            None => (line.to_string(), None, 0),
        };
        if is_private(&command) {
            return ParsedLine::Skip;
        }

        match command.strip_suffix('\\') {
            Some(head) => {
                self.pending = Some((head.to_string(), timestamp, duration));
                ParsedLine::Pending
            }
            None => ParsedLine::command(command, timestamp, duration),
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}

/// bash, with optional `HISTTIMEFORMAT` comment lines (`#<epoch>`).
#[derive(Debug, Default)]
pub struct BashParser {
    timestamp: Option<i64>,
}

impl ShellParser for BashParser {
    fn kind(&self) -> ShellKind {
        ShellKind::Bash
    }

    fn parse_line(&mut self, raw: &str) -> ParsedLine {
        let line = raw.trim_end_matches('\r');
        if let Some(caps) = BASH_TIMESTAMP_RE.captures(line) {
            self.timestamp = caps[1].parse::<i64>().ok();
            return ParsedLine::Pending;
        }
        let timestamp = self.timestamp.take();
        if is_private(line) {
            return ParsedLine::Skip;
        }
        ParsedLine::command(line, timestamp, 0)
    }

    fn is_idle(&self) -> bool {
        self.timestamp.is_none()
    }
}

/// fish's YAML-like `fish_history`.
#[derive(Debug, Default)]
pub struct FishParser {
    pending: Option<String>,
}

/// Undo fish's escaping of backslashes and newlines.
fn unescape_fish(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl ShellParser for FishParser {
    fn kind(&self) -> ShellKind {
        ShellKind::Fish
    }

    fn parse_line(&mut self, raw: &str) -> ParsedLine {
        let line = raw.trim_end_matches('\r');

        if let Some(caps) = FISH_CMD_RE.captures(line) {
            let command = unescape_fish(&caps[1]);
            let previous = self.pending.replace(command);
            // A record without `when:` is still a command.
            return match previous {
                Some(prev) if !is_private(&prev) => ParsedLine::command(prev, None, 0),
                _ => ParsedLine::Pending,
            };
        }

        if let Some(caps) = FISH_WHEN_RE.captures(line) {
            let Some(command) = self.pending.take() else {
                return ParsedLine::Skip;
            };
            if is_private(&command) {
                return ParsedLine::Skip;
            }
            return ParsedLine::command(command, caps[1].parse::<i64>().ok(), 0);
        }

        // `paths:` blocks and anything else fish records
        ParsedLine::Skip
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
