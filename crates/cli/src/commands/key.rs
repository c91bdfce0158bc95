// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::Result;

use super::load;

pub fn run() -> Result<()> {
    let (config, _) = load()?;
    println!("{}", config.public_key);
    Ok(())
}
