// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    config_invalid = { Error::ConfigInvalid { field: "endpoint", reason: "is missing".into() }, "endpoint is missing" },
    invalid_endpoint = { Error::InvalidEndpoint("nope".into()), "nope" },
    key_parse = { Error::KeyParse { key: "remote public key", reason: "bad base64".into() }, "remote public key" },
    engine = { Error::Engine("bind failed".into()), "bind failed" },
    not_connected = { Error::NotConnected, "not connected" },
    duplicate = { Error::DuplicateHash("abc".into()), "already recorded" },
    not_found = { Error::NotFound("entry abc".into()), "entry abc" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn key_parse_has_hint() {
    let err = Error::KeyParse {
        key: "local private key",
        reason: "wrong length".into(),
    };
    assert!(err.to_string().contains("hint:"));
}

#[test]
fn classifiers() {
    assert!(Error::DuplicateHash("h".into()).is_duplicate());
    assert!(!Error::NotFound("h".into()).is_duplicate());
    assert!(Error::NotFound("h".into()).is_not_found());
    assert!(!Error::NotConnected.is_not_found());
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn error_from_rusqlite() {
    let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, Error::Store(_)));
}
