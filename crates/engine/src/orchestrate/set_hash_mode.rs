// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `set_hash_mode` (`spec.md` §6/§9): accepted and validated — the handle
//! must exist — but otherwise inert until the hash-mode subsystem is
//! defined, per `DESIGN.md`'s Open Question decision. Grounded on
//! `service_logic/handle_operation.py`'s `set_hash_mode`, which is likewise
//! a stub (`# TODO set close mode`).

use snapd_core::{Clock, CoreResult};

use crate::service::Service;

/// Validates that `handle` exists and records `hash_mode` on it. Has no
/// other effect until the hash-mode subsystem (see `spec.md` §3's inert
/// `HashRow`) is built out.
pub fn set_hash_mode<C: Clock>(service: &Service<C>, handle: &str, hash_mode: u32) -> CoreResult<()> {
    let record = service.handle_pool.get(handle)?;
    record.set_hash_mode(hash_mode);
    Ok(())
}

#[cfg(test)]
#[path = "set_hash_mode_tests.rs"]
mod tests;
