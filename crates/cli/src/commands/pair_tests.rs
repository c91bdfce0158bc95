// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::commands::testing::TestContext;
use syncsh_core::SecretKey;
use yare::parameterized;

fn options(public_key: &str) -> PairOptions {
    PairOptions {
        role: Role::Initiator,
        endpoint: "203.0.113.7:51820".to_string(),
        public_key: public_key.to_string(),
        machine_id: Some("desktop".to_string()),
        keepalive_secs: None,
        mtu: None,
    }
}

#[test]
fn test_pair_records_peer() {
    let ctx = TestContext::new("laptop");
    let other = SecretKey::generate().public_key().to_base64();

    run_impl(&ctx.home, options(&other)).unwrap();

    let config = Config::load(&ctx.home).unwrap();
    let peer = config.peer().unwrap();
    assert_eq!(peer.role, Role::Initiator);
    assert_eq!(peer.endpoint, "203.0.113.7:51820");
    assert_eq!(peer.public_key, other);
    assert_eq!(peer.machine_id.as_deref(), Some("desktop"));
    assert!(config.link_config().is_ok());
}

#[test]
fn test_pair_replaces_previous_peer() {
    let ctx = TestContext::new("laptop");
    let first = SecretKey::generate().public_key().to_base64();
    let second = SecretKey::generate().public_key().to_base64();
    run_impl(&ctx.home, options(&first)).unwrap();

    let mut again = options(&second);
    again.role = Role::Responder;
    run_impl(&ctx.home, again).unwrap();

    let config = Config::load(&ctx.home).unwrap();
    assert_eq!(config.peer().unwrap().public_key, second);
    assert_eq!(config.peer().unwrap().role, Role::Responder);
}

#[parameterized(
    no_port = { "203.0.113.7" },
    hostname = { "desktop.lan:51820" },
    zero_port = { "203.0.113.7:0" },
)]
fn test_pair_rejects_bad_endpoint(endpoint: &str) {
    let ctx = TestContext::new("laptop");
    let mut opts = options(&SecretKey::generate().public_key().to_base64());
    opts.endpoint = endpoint.to_string();

    assert!(run_impl(&ctx.home, opts).is_err());
    assert!(Config::load(&ctx.home).unwrap().peer.is_none());
}

#[test]
fn test_pair_rejects_malformed_key() {
    let ctx = TestContext::new("laptop");
    let err = run_impl(&ctx.home, options("not-a-key")).unwrap_err();
    assert!(err.to_string().contains("remote public key"), "{err}");
}

#[test]
fn test_pair_rejects_own_key() {
    let ctx = TestContext::new("laptop");
    let own = ctx.config.public_key.clone();
    let err = run_impl(&ctx.home, options(&own)).unwrap_err();
    assert!(err.to_string().contains("own key"), "{err}");
}

#[test]
fn test_pair_rejects_own_machine_id() {
    let ctx = TestContext::new("laptop");
    let mut opts = options(&SecretKey::generate().public_key().to_base64());
    opts.machine_id = Some("laptop".to_string());
    assert!(run_impl(&ctx.home, opts).is_err());
}

#[test]
fn test_pair_rejects_tiny_mtu() {
    let ctx = TestContext::new("laptop");
    let mut opts = options(&SecretKey::generate().public_key().to_base64());
    opts.mtu = Some(100);
    let err = run_impl(&ctx.home, opts).unwrap_err();
    assert!(err.to_string().contains("mtu"), "{err}");
}
