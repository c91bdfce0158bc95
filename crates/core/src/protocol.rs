// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync protocol messages exchanged through the tunnel.
//!
//! The protocol is simple:
//! - The dialing side introduces itself with `Hello`, then asks for
//!   entries newer than its cursor
//! - The listening side answers each request from its own store
//!
//! Messages are framed as:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON-encoded message

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::entry::HistoryEntry;
use crate::error::{Error, Result};

/// Protocol revision carried in `Hello`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum frame size (64MB) so a corrupt length prefix cannot exhaust memory.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Messages sent by the side pulling entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Introduce the caller.
    Hello { machine_id: String, version: u32 },

    /// Request the responder's own entries with `timestamp > since`.
    EntriesSince { since: i64 },

    /// Liveness check.
    Ping {
        /// Caller-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent by the side answering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Reply to `Hello` naming the responder.
    Hello { machine_id: String, version: u32 },

    /// Reply to `EntriesSince`, newest first.
    Entries { entries: Vec<HistoryEntry> },

    /// Echo of a `Ping`.
    Pong { id: u64 },

    /// The request could not be served.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl Request {
    pub fn hello(machine_id: impl Into<String>) -> Self {
        Request::Hello {
            machine_id: machine_id.into(),
            version: PROTOCOL_VERSION,
        }
    }

    pub fn entries_since(since: i64) -> Self {
        Request::EntriesSince { since }
    }

    pub fn ping(id: u64) -> Self {
        Request::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl Response {
    pub fn hello(machine_id: impl Into<String>) -> Self {
        Response::Hello {
            machine_id: machine_id.into(),
            version: PROTOCOL_VERSION,
        }
    }

    pub fn entries(entries: Vec<HistoryEntry>) -> Self {
        Response::Entries { entries }
    }

    pub fn pong(id: u64) -> Self {
        Response::Pong { id }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Write one framed message.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(Error::Protocol(format!(
            "message too large: {} bytes (max {MAX_MESSAGE_SIZE})",
            json.len()
        )));
    }
    let len = u32::try_from(json.len())
        .map_err(|_| Error::Protocol("message too large".to_string()))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message. Returns `None` on a clean end of stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(Error::Protocol(format!(
            "message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"
        )));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let message = serde_json::from_slice(&buf)?;
    Ok(Some(message))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
