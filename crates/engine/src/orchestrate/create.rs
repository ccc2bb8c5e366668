// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `create_snapshot` (`spec.md` §4.7), grounded verbatim on
//! `service_logic/consume_journal.py`'s `CreateCdpStorage`/`CreateQcowStorage`.
//!
//! Both branches follow the same shape: under the journal+storage locks and
//! one transaction, resolve the new node's parent, insert its row
//! (`CREATING`), build and acquire its chain; outside every lock, ask the
//! image service to actually create the file; under the storage lock and a
//! second transaction, transition the row to `WRITING`. Any failure after
//! the row exists marks it `ABNORMAL` on a best-effort basis and destroys
//! the handle before propagating the error.

use std::sync::Arc;

use snapd_core::{Clock, CoreError, CoreResult, JournalToken, Status, StorageIdent, StorageType, Timestamp, TreeIdent};
use snapd_storage::{NewSnapshotStorage, SnapshotStorage, Store, Transaction};

use crate::chain::{ChainKind, StorageChain};
use crate::graph::{PathOrder, StorageGraph};
use crate::handle_pool::Handle;
use crate::image_path;
use crate::journal::{self, CreateInJournal};
use crate::service::Service;

/// Mirrors `idd.CreateSnapshotParams`.
#[derive(Clone, Debug)]
pub struct CreateSnapshotParams {
    pub handle: String,
    pub journal_token: JournalToken,
    pub caller_trace: String,
    pub caller_pid: i64,
    pub caller_pid_created: i64,
}

/// Consumes `params.journal_token`'s CREATE journal and creates the node it
/// describes, returning the new write handle.
pub async fn create_snapshot<C: Clock>(
    service: &Service<C>,
    params: CreateSnapshotParams,
) -> CoreResult<Arc<Handle>> {
    let now = service.now();
    let trace = format!(
        "create storage handle:{},trace:{},pid:{},pid_ts:{}",
        params.handle, params.caller_trace, params.caller_pid, params.caller_pid_created
    );
    let jn = journal::consume_create(&service.store, &service.locker, now, params.journal_token, trace.clone())?;

    let handle = service.handle_pool.insert(params.handle.clone(), true, params.caller_trace.clone(), now)?;

    let mut new_row: Option<SnapshotStorage> = None;
    let result = if jn.is_cdp() {
        create_cdp(service, &handle, &jn, &trace, &mut new_row).await
    } else {
        create_qcow(service, &handle, &jn, &trace, &mut new_row).await
    };

    match result {
        Ok(()) => Ok(handle),
        Err(e) => {
            let _ = service.handle_pool.destroy(&params.handle, service.image_service.as_ref()).await;
            set_abnormal_best_effort(&service.store, service.now(), new_row.as_ref());
            Err(e)
        }
    }
}

fn set_abnormal_best_effort(store: &Store, now: Timestamp, row: Option<&SnapshotStorage>) {
    let Some(row) = row else { return };
    let mut txn = store.begin(now);
    let result = txn.storage_update_status(row, Status::Abnormal).and_then(|_| txn.commit());
    if let Err(e) = result {
        tracing::error!(error = %e, ident = %row.ident, "failed to mark storage abnormal after create failure");
    }
}

fn caller_name(jn: &CreateInJournal, handle: &Handle) -> String {
    format!("creating new {} storage: <{}> in [{}]", jn.params.new_type, jn.params.new_ident, handle.handle)
}

enum CdpParentResolution {
    Found(SnapshotStorage),
    /// The only ancestor we can name is itself a pending root CREATE
    /// journal — the new node gets no `parent_ident` yet; its eventual
    /// parent will rewrite it via `append_child`/`storage_update_parent`
    /// when that journal is consumed.
    PendingRoot,
}

async fn create_cdp<C: Clock>(
    service: &Service<C>,
    handle: &Arc<Handle>,
    jn: &CreateInJournal,
    trace: &str,
    new_row: &mut Option<SnapshotStorage>,
) -> CoreResult<()> {
    if jn.params.parent_timestamp.is_some() {
        return Err(CoreError::Validation(format!(
            "cdp create journal {} must not carry parent_timestamp",
            jn.row.token
        )));
    }

    let row = {
        let (_jguard, _sguard) = service.locker.acquire_both(trace.to_string());
        let mut txn = service.store.begin(service.now());

        let resolution = query_cdp_parent_storage(&service.store, &mut txn, jn)?;
        let (parent_ident, tree_ident) = match &resolution {
            CdpParentResolution::Found(parent) => (Some(parent.ident), parent.tree_ident),
            CdpParentResolution::PendingRoot => (None, TreeIdent::generate()),
        };

        let image_path = image_path::generate_cdp(&jn.params.new_storage_folder, jn.params.new_ident.as_str());
        let row = txn.storage_create(NewSnapshotStorage {
            ident: jn.params.new_ident,
            parent_ident,
            parent_timestamp: jn.params.parent_timestamp,
            storage_type: StorageType::Cdp,
            disk_bytes: jn.params.new_disk_bytes,
            image_path,
            tree_ident,
            file_level_deduplication: false,
            start_timestamp: Some(service.now()),
            finish_timestamp: None,
        })?;
        *new_row = Some(row.clone());

        let mut chain = StorageChain::new(ChainKind::Write, service.reference_manager.clone(), caller_name(jn, handle));
        chain.insert_tail(row.clone());
        chain.acquire()?;
        handle.set_chain(chain);

        txn.commit()?;
        row
    };

    let (raw_handle, endpoint) =
        service.image_service.create(&row.image_path, &[], row.disk_bytes, &handle.raw_flag).await?;
    handle.set_raw(raw_handle, endpoint);

    {
        let _guard = service.locker.acquire_storage(trace.to_string());
        let mut txn = service.store.begin(service.now());
        let updated = txn.storage_update_status(&row, Status::Writing)?;
        txn.commit()?;
        *new_row = Some(updated);
    }
    Ok(())
}

/// Resolves a CDP node's parent (`spec.md` §4.8): first by direct storage
/// lookup, then — if the parent is itself still an unconsumed pending CREATE
/// — by walking that journal's own parent chain up to the first ancestor
/// already present in storage. Records this node as a child of whichever
/// pending journal it found, so that journal's eventual consumption rewrites
/// this node's `parent_ident`.
fn query_cdp_parent_storage(
    store: &Store,
    txn: &mut Transaction<'_>,
    jn: &CreateInJournal,
) -> CoreResult<CdpParentResolution> {
    let parent_ident = jn
        .params
        .parent_ident
        .ok_or_else(|| CoreError::Validation(format!("cdp create journal {} has no parent_ident", jn.row.token)))?;

    if let Some(parent) = store.storage_by_ident(parent_ident) {
        return Ok(CdpParentResolution::Found(parent));
    }

    let unconsumed = journal::query_unconsumed_create_before(store, jn)?;
    let mut found = unconsumed
        .iter()
        .find(|cand| cand.params.new_ident == parent_ident && cand.is_qcow())
        .cloned()
        .ok_or_else(|| {
            CoreError::state_conflict(format!(
                "cdp create journal {}: parent_ident {parent_ident} not in storage or unconsumed create journals",
                jn.row.token
            ))
        })?;

    found.append_child(txn, jn.params.new_ident)?;

    if found.is_root() {
        return Ok(CdpParentResolution::PendingRoot);
    }

    let ancestor_ident = find_ancestor_in_storage(&found, &unconsumed)?;
    store.storage_by_ident(ancestor_ident).map(CdpParentResolution::Found).ok_or_else(|| {
        CoreError::state_conflict(format!(
            "cdp create journal {}: parent_ident {ancestor_ident} not in storage",
            jn.row.token
        ))
    })
}

/// Walks up a chain of pending CREATE journals (each node's parent still
/// unconsumed) until one's `parent_ident` is no longer among them — that
/// ident must already name a real storage row.
fn find_ancestor_in_storage(start: &CreateInJournal, unconsumed: &[CreateInJournal]) -> CoreResult<StorageIdent> {
    let mut current = start.clone();
    while let Some(next) = current.find_parent_in_journals(unconsumed) {
        current = next.clone();
    }
    current
        .params
        .parent_ident
        .ok_or_else(|| CoreError::graph_integrity(format!("journal {} chain has no resolvable parent_ident", current.row.token)))
}

async fn create_qcow<C: Clock>(
    service: &Service<C>,
    handle: &Arc<Handle>,
    jn: &CreateInJournal,
    trace: &str,
    new_row: &mut Option<SnapshotStorage>,
) -> CoreResult<()> {
    let row = {
        let (_jguard, _sguard) = service.locker.acquire_both(trace.to_string());
        let mut txn = service.store.begin(service.now());

        let (parent, depend_nodes, tree_ident) = query_qcow_parent_and_chain(&service.store, jn)?;

        let image_path = image_path::generate_qcow(
            parent.as_ref(),
            &jn.params.new_storage_folder,
            jn.params.new_disk_bytes,
            &service.reference_manager,
        );

        let row = txn.storage_create(NewSnapshotStorage {
            ident: jn.params.new_ident,
            parent_ident: parent.as_ref().map(|p| p.ident),
            parent_timestamp: jn.params.parent_timestamp,
            storage_type: StorageType::Qcow,
            disk_bytes: jn.params.new_disk_bytes,
            image_path,
            tree_ident,
            file_level_deduplication: false,
            start_timestamp: Some(service.now()),
            finish_timestamp: None,
        })?;
        *new_row = Some(row.clone());

        if jn.is_root() {
            deal_children_in_journal(&service.store, &mut txn, jn, &row)?;
        }

        let mut chain =
            StorageChain::new(ChainKind::ReadWrite, service.reference_manager.clone(), caller_name(jn, handle));
        for node in &depend_nodes {
            chain.insert_tail(node.clone());
        }
        chain.insert_tail(row.clone());
        chain.acquire()?;
        handle.set_chain(chain);

        txn.commit()?;
        check_tree(&service.store, row.tree_ident)?;
        row
    };

    let parents: Vec<String> = handle
        .with_chain(|c| c.key_items().iter().filter(|i| i.ident != row.ident).map(|i| i.image_path.clone()).collect())
        .unwrap_or_default();
    let (raw_handle, endpoint) =
        service.image_service.create(&row.image_path, &parents, row.disk_bytes, &handle.raw_flag).await?;
    handle.set_raw(raw_handle, endpoint);

    {
        let _guard = service.locker.acquire_storage(trace.to_string());
        let mut txn = service.store.begin(service.now());
        if !jn.is_root() {
            deal_children_in_journal(&service.store, &mut txn, jn, &row)?;
        }
        let updated = txn.storage_update_status(&row, Status::Writing)?;
        txn.commit()?;
        check_tree(&service.store, updated.tree_ident)?;
        *new_row = Some(updated);
    }
    Ok(())
}

fn query_qcow_parent_and_chain(
    store: &Store,
    jn: &CreateInJournal,
) -> CoreResult<(Option<SnapshotStorage>, Vec<SnapshotStorage>, TreeIdent)> {
    if jn.is_root() {
        let tree_ident = jn.children_storages(store).first().map(|s| s.tree_ident).unwrap_or_else(TreeIdent::generate);
        return Ok((None, Vec::new(), tree_ident));
    }

    let parent_ident = jn.params.parent_ident.expect("non-root journal has a parent_ident");
    let parent = store.storage_by_ident(parent_ident).ok_or_else(|| {
        CoreError::state_conflict(format!(
            "qcow create journal {}: parent_ident {parent_ident} not in storage",
            jn.row.token
        ))
    })?;
    let tree_ident = parent.tree_ident;

    let rows = store.query_valid_storages(tree_ident);
    let graph = StorageGraph::build(tree_ident, rows)?;
    let depend_nodes: Vec<SnapshotStorage> =
        graph.path_to_root(parent_ident, PathOrder::RootToTail)?.into_iter().cloned().collect();

    for node in &depend_nodes {
        match node.status {
            Status::Creating => {
                return Err(CoreError::state_conflict(format!("invalid storage chain, {} is CREATING", node.ident)))
            }
            Status::Abnormal => {
                return Err(CoreError::state_conflict(format!("invalid storage chain, {} is ABNORMAL", node.ident)))
            }
            _ => {}
        }
    }

    Ok((Some(parent), depend_nodes, tree_ident))
}

/// Rewrites the `parent_ident` of every storage row this journal recorded as
/// an out-of-order child, now that this journal's own node exists.
fn deal_children_in_journal(
    store: &Store,
    txn: &mut Transaction<'_>,
    jn: &CreateInJournal,
    new_row: &SnapshotStorage,
) -> CoreResult<()> {
    for child in jn.children_storages(store) {
        if child.parent_timestamp.is_some() {
            return Err(CoreError::graph_integrity(format!(
                "child storage {} in journal {} carries a parent_timestamp",
                child.ident, jn.row.token
            )));
        }
        txn.storage_update_parent(&child, Some(new_row.ident))?;
    }
    Ok(())
}

fn check_tree(store: &Store, tree_ident: TreeIdent) -> CoreResult<()> {
    let rows = store.query_valid_storages(tree_ident);
    StorageGraph::build(tree_ident, rows)?;
    Ok(())
}

#[cfg(test)]
#[path = "create_tests.rs"]
mod tests;
