// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::commands::testing::TestContext;

#[test]
fn test_import_records_own_machine_id() {
    let mut ctx = TestContext::new("laptop");
    ctx.append_history(": 100:0;ls\n: 101:0;make\n");

    let report = run_impl(&mut ctx.db, &ctx.config).unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(ctx.db.scope().count(Some("laptop")).unwrap(), 2);
}

#[test]
fn test_import_twice_is_idempotent() {
    let mut ctx = TestContext::new("laptop");
    ctx.append_history(": 100:0;ls\n");
    run_impl(&mut ctx.db, &ctx.config).unwrap();

    let report = run_impl(&mut ctx.db, &ctx.config).unwrap();
    assert_eq!(report.commands, 0);
    assert_eq!(ctx.db.scope().count(None).unwrap(), 1);
}
