// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps one [`Request`] onto the matching `snapd-engine` orchestrator call
//! and the matching [`Response`] (`spec.md` §6's dispatch table) —
//! `spec.md` §1's "request dispatch, and JSON schema validation (thin
//! glue)" that sits outside the core.

use snapd_core::{Clock, CoreError, JournalToken, StorageIdent, Timestamp};
use snapd_engine::{
    close_snapshot, create_snapshot, generate_journal_for_create, generate_journal_for_destroy, get_raw_handle,
    open_snapshot, set_hash_mode, CreateSnapshotParams, NewCreateJournal, OpenSnapshotParams, Service,
};
use snapd_wire::{Request, Response};

fn validate_ident(s: &str) -> Result<StorageIdent, CoreError> {
    StorageIdent::from_str_checked(s)
}

fn validate_token(s: &str) -> Result<JournalToken, CoreError> {
    JournalToken::from_str_checked(s)
}

/// Runs `request` against `service`, returning the [`Response`] to write
/// back to the caller. Never returns `Err` — every failure is translated
/// into a [`Response::Error`], matching `spec.md` §7's "all RPC failures
/// surface as a single error response".
pub async fn handle<C: Clock>(service: &Service<C>, request: Request) -> Response {
    match try_handle(service, request).await {
        Ok(response) => response,
        Err(e) => Response::from_core_error(&e),
    }
}

async fn try_handle<C: Clock>(service: &Service<C>, request: Request) -> Result<Response, CoreError> {
    match request {
        Request::GenerateJournalForCreate {
            journal_token,
            new_ident,
            parent_ident,
            parent_timestamp,
            new_type,
            new_storage_folder,
            new_disk_bytes,
            new_hash_version,
        } => {
            let params = NewCreateJournal {
                journal_token: validate_token(&journal_token)?,
                new_ident: validate_ident(&new_ident)?,
                parent_ident: parent_ident.as_deref().map(validate_ident).transpose()?,
                parent_timestamp: parent_timestamp.map(|secs| Timestamp::from_micros((secs * 1_000_000.0) as i64)),
                new_type,
                new_storage_folder,
                new_disk_bytes,
                new_hash_version: new_hash_version.unwrap_or(1),
            };
            generate_journal_for_create(&service.store, service.now(), params)?;
            Ok(Response::Ok)
        }

        Request::GenerateJournalForDestroy { journal_token, idents } => {
            let idents =
                idents.iter().map(|s| validate_ident(s)).collect::<Result<Vec<_>, _>>()?;
            generate_journal_for_destroy(&service.store, service.now(), validate_token(&journal_token)?, &idents)?;
            Ok(Response::Ok)
        }

        Request::CreateSnapshot { handle, journal_token, caller_trace, caller_pid, caller_pid_created } => {
            if handle.len() > 32 {
                return Err(CoreError::Validation(format!("handle {handle:?} exceeds 32 characters")));
            }
            let params = CreateSnapshotParams {
                handle,
                journal_token: validate_token(&journal_token)?,
                caller_trace: caller_trace.unwrap_or_default(),
                caller_pid,
                caller_pid_created,
            };
            let handle = create_snapshot(service, params).await?;
            Ok(handle_response(&handle))
        }

        Request::OpenSnapshot {
            handle,
            caller_trace,
            caller_pid,
            caller_pid_created,
            storage_ident,
            timestamp,
            open_raw_handle,
        } => {
            let params = OpenSnapshotParams {
                handle,
                caller_trace: caller_trace.unwrap_or_default(),
                caller_pid,
                caller_pid_created,
                storage_ident: validate_ident(&storage_ident)?,
                timestamp: timestamp.map(|secs| Timestamp::from_micros((secs * 1_000_000.0) as i64)),
                open_raw_handle,
            };
            let handle = open_snapshot(service, params).await?;
            Ok(handle_response(&handle))
        }

        Request::CloseSnapshot { handle } => {
            close_snapshot(service, &handle).await?;
            Ok(Response::Ok)
        }

        Request::GetRawHandle { handle } => {
            let handle = get_raw_handle(service, &handle).await?;
            Ok(handle_response(&handle))
        }

        Request::SetHashMode { handle, hash_mode } => {
            set_hash_mode(service, &handle, hash_mode)?;
            Ok(Response::Ok)
        }
    }
}

fn handle_response(handle: &snapd_engine::Handle) -> Response {
    Response::Handle { raw_handle: handle.raw_handle(), ice_endpoint: handle.endpoint().map(|e| e.0).unwrap_or_default() }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
