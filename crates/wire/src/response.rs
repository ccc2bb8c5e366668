// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response schema (`spec.md` §6). All RPC failures surface as a single
//! `Error` variant carrying a stable numeric code and a human message
//! (`spec.md` §7).

use serde::{Deserialize, Serialize};

/// Reply to one [`crate::Request`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// `generate_journal_for_create`, `generate_journal_for_destroy`,
    /// `close_snapshot`, `set_hash_mode` all reply with `{}`.
    Ok,

    /// `create_snapshot`, `open_snapshot`, `get_raw_handle` reply with
    /// `{raw_handle, ice_endpoint}`.
    Handle { raw_handle: i64, ice_endpoint: String },

    /// A single error response carrying a stable numeric code (`spec.md`
    /// §7's error kinds) and a human message.
    Error { code: u32, message: String },
}

impl Response {
    pub fn from_core_error(err: &snapd_core::CoreError) -> Self {
        Response::Error { code: err.code(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
