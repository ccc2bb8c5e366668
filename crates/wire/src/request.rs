// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request schema for the six RPC calls (`spec.md` §6). Idents and tokens
//! travel as plain strings on the wire — validating them into
//! [`snapd_core::StorageIdent`]/[`snapd_core::JournalToken`] is the
//! dispatcher's job (`spec.md` §1: "JSON schema validation" is thin glue
//! outside the core), not this schema's.

use serde::{Deserialize, Serialize};
use snapd_core::StorageType;

/// One inbound call, dispatched on `call` (matches `Op(call, json)` in
/// `spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Request {
    GenerateJournalForCreate {
        journal_token: String,
        new_ident: String,
        #[serde(default)]
        parent_ident: Option<String>,
        #[serde(default)]
        parent_timestamp: Option<f64>,
        new_type: StorageType,
        new_storage_folder: String,
        new_disk_bytes: u64,
        #[serde(default)]
        new_hash_version: Option<u32>,
    },
    GenerateJournalForDestroy {
        journal_token: String,
        idents: Vec<String>,
    },
    CreateSnapshot {
        handle: String,
        journal_token: String,
        #[serde(default)]
        caller_trace: Option<String>,
        caller_pid: i64,
        caller_pid_created: i64,
    },
    OpenSnapshot {
        handle: String,
        #[serde(default)]
        caller_trace: Option<String>,
        caller_pid: i64,
        caller_pid_created: i64,
        storage_ident: String,
        #[serde(default)]
        timestamp: Option<f64>,
        #[serde(default)]
        open_raw_handle: bool,
    },
    CloseSnapshot {
        handle: String,
    },
    GetRawHandle {
        handle: String,
    },
    SetHashMode {
        handle: String,
        hash_mode: u32,
    },
}

impl Request {
    /// Short label for log lines, matching the teacher's `request = ?request`
    /// debug-vs-info split (queries logged at debug, everything else info —
    /// this protocol has no pure-query calls, so every call is info-level).
    pub fn call_name(&self) -> &'static str {
        match self {
            Request::GenerateJournalForCreate { .. } => "generate_journal_for_create",
            Request::GenerateJournalForDestroy { .. } => "generate_journal_for_destroy",
            Request::CreateSnapshot { .. } => "create_snapshot",
            Request::OpenSnapshot { .. } => "open_snapshot",
            Request::CloseSnapshot { .. } => "close_snapshot",
            Request::GetRawHandle { .. } => "get_raw_handle",
            Request::SetHashMode { .. } => "set_hash_mode",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
