// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `close_snapshot` (`spec.md` §4.9), grounded verbatim on
//! `service_logic/handle_operation.py`'s `CloseStorage`.
//!
//! A writer handle is destroyed first, then its tail row transitions to
//! HASHING; if that transition fails the row is marked ABNORMAL instead and
//! the error is propagated. A reader handle is simply destroyed.

use snapd_core::{Clock, CoreResult, Status};
use snapd_storage::SnapshotStorage;

use crate::service::Service;

/// Closes `handle`, releasing its chain and (for a writer) transitioning
/// its tail storage row out of WRITING.
pub async fn close_snapshot<C: Clock>(service: &Service<C>, handle: &str) -> CoreResult<()> {
    let record = service.handle_pool.get(handle)?;
    let tail = record.with_chain(|chain| chain.tail().clone());
    let writing = record.writing;

    service.handle_pool.destroy(handle, service.image_service.as_ref()).await?;

    if !writing {
        return Ok(());
    }

    let Some(tail) = tail else { return Ok(()) };
    let trace = format!("close storage handle:{handle}");
    if let Err(e) = transition(service, &tail, Status::Hashing, &trace) {
        if let Err(abnormal_err) = transition(service, &tail, Status::Abnormal, &trace) {
            tracing::error!(error = %abnormal_err, ident = %tail.ident, "failed to mark storage abnormal after close failure");
        }
        return Err(e);
    }
    Ok(())
}

fn transition<C: Clock>(service: &Service<C>, row: &SnapshotStorage, status: Status, trace: &str) -> CoreResult<()> {
    let _guard = service.locker.acquire_storage(trace.to_string());
    let mut txn = service.store.begin(service.now());
    txn.storage_update_status(row, status)?;
    txn.commit()
}

#[cfg(test)]
#[path = "close_tests.rs"]
mod tests;
