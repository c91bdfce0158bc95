// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WireGuard key material.
//!
//! Keys travel as standard base64 of 32 raw bytes. Secret bytes live in
//! [`Zeroizing`] buffers and are wiped when dropped; none of these types
//! implement `Display`, and their `Debug` output is redacted.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize, Serializer};
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Raw key length in bytes.
pub const KEY_LEN: usize = 32;

/// Unparsed key text as found in configuration, wiped on drop.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct KeyMaterial(Zeroizing<String>);

impl KeyMaterial {
    pub fn new(text: impl Into<String>) -> Self {
        KeyMaterial(Zeroizing::new(text.into()))
    }

    /// The base64 text. Handle with care.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for KeyMaterial {
    fn from(text: String) -> Self {
        KeyMaterial(Zeroizing::new(text))
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Decodes base64 key text into exactly [`KEY_LEN`] bytes.
fn decode_key(text: &str, key: &'static str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let decoded = Zeroizing::new(STANDARD.decode(text.trim()).map_err(|e| Error::KeyParse {
        key,
        reason: format!("not valid base64 ({e})"),
    })?);
    if decoded.len() != KEY_LEN {
        return Err(Error::KeyParse {
            key,
            reason: format!("expected {KEY_LEN} bytes, got {}", decoded.len()),
        });
    }
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

/// A local private key.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Generate a new random X25519 private key.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        SecretKey(Zeroizing::new(secret.to_bytes()))
    }

    /// Parse base64 key text. `key` names the key in error messages.
    pub fn parse(text: &str, key: &'static str) -> Result<Self> {
        decode_key(text, key).map(SecretKey)
    }

    /// Derive the matching X25519 public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(*self.0);
        PublicKey(*x25519_dalek::PublicKey::from(&secret).as_bytes())
    }

    /// Base64 form for writing to the configuration file.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(*self.0))
    }

    /// Lowercase hex form used by the UAPI protocol.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.0))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public", &self.public_key().to_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A remote peer's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn parse(text: &str, key: &'static str) -> Result<Self> {
        decode_key(text, key).map(|bytes| PublicKey(*bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
