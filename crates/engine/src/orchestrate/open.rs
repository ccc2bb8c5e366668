// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `open_snapshot` (`spec.md` §4.9), grounded verbatim on
//! `service_logic/handle_operation.py`'s `OpenStorage`.
//!
//! Builds a read-only chain from the tree root down to the requested node,
//! registers it in the handle pool under the journal+storage locks, then —
//! only if the caller asked for it — opens the underlying raw handle
//! outside any lock.

use std::sync::Arc;

use snapd_core::{Clock, CoreError, CoreResult, StorageIdent, Timestamp};
use snapd_storage::SnapshotStorage;

use crate::chain::{ChainKind, StorageChain};
use crate::graph::{PathOrder, StorageGraph};
use crate::handle_pool::Handle;
use crate::service::Service;

/// Mirrors `idd.OpenSnapshotParams`.
#[derive(Clone, Debug)]
pub struct OpenSnapshotParams {
    pub handle: String,
    pub caller_trace: String,
    pub caller_pid: i64,
    pub caller_pid_created: i64,
    pub storage_ident: StorageIdent,
    /// Caller-supplied handle creation time; defaults to the service clock
    /// when absent.
    pub timestamp: Option<Timestamp>,
    pub open_raw_handle: bool,
}

/// Opens a read chain from the root of `params.storage_ident`'s tree down to
/// that node, registering it in the handle pool. If `params.open_raw_handle`
/// is set, also opens the underlying raw handle before returning; otherwise
/// the raw handle stays deferred until [`get_raw_handle`](crate::orchestrate::get_raw_handle).
pub async fn open_snapshot<C: Clock>(service: &Service<C>, params: OpenSnapshotParams) -> CoreResult<Arc<Handle>> {
    let trace = format!(
        "open storage handle:{},ident:{},trace:{},pid:{},pid_ts:{}",
        params.handle, params.storage_ident, params.caller_trace, params.caller_pid, params.caller_pid_created
    );
    let created_timestamp = params.timestamp.unwrap_or_else(|| service.now());

    let handle = service.handle_pool.insert(params.handle.clone(), false, params.caller_trace.clone(), created_timestamp)?;

    let result = open_chain(service, &handle, &params, &trace);
    if let Err(e) = result {
        let _ = service.handle_pool.destroy(&params.handle, service.image_service.as_ref()).await;
        return Err(e);
    }

    if params.open_raw_handle {
        if let Err(e) = open_raw(service, &handle).await {
            let _ = service.handle_pool.destroy(&params.handle, service.image_service.as_ref()).await;
            return Err(e);
        }
    }

    Ok(handle)
}

fn open_chain<C: Clock>(
    service: &Service<C>,
    handle: &Arc<Handle>,
    params: &OpenSnapshotParams,
    trace: &str,
) -> CoreResult<()> {
    let (_jguard, _sguard) = service.locker.acquire_both(trace.to_string());

    let target = service
        .store
        .storage_by_ident(params.storage_ident)
        .ok_or_else(|| CoreError::not_found(format!("storage ident {}", params.storage_ident)))?;

    let rows = service.store.query_valid_storages(target.tree_ident);
    let graph = StorageGraph::build(target.tree_ident, rows)?;
    let path: Vec<SnapshotStorage> =
        graph.path_to_root(params.storage_ident, PathOrder::RootToTail)?.into_iter().cloned().collect();

    let mut chain = StorageChain::new(
        ChainKind::Read,
        service.reference_manager.clone(),
        format!("opening {} storage: <{}> in [{}]", target.storage_type, target.ident, handle.handle),
    );
    for node in path {
        chain.insert_tail(node);
    }
    chain.acquire()?;
    handle.set_chain(chain);
    Ok(())
}

async fn open_raw<C: Clock>(service: &Service<C>, handle: &Arc<Handle>) -> CoreResult<()> {
    let paths: Vec<String> =
        handle.with_chain(|c| c.key_items().iter().map(|i| i.image_path.clone()).collect()).unwrap_or_default();
    let (raw_handle, endpoint) = service.image_service.open(&paths, &handle.raw_flag).await?;
    handle.set_raw(raw_handle, endpoint);
    Ok(())
}

#[cfg(test)]
#[path = "open_tests.rs"]
mod tests;
