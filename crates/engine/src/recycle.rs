// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recycling planner (`spec.md` §4.9), grounded verbatim on
//! `service_logic/storage_collection.py`'s `StorageCollection` and its five
//! `*Work` subclasses.
//!
//! One [`run_once`] call is one pass over a single `tree_ident`: under the
//! `storage` lock, it builds the in-memory graph and runs the analyzer,
//! which emits at most one *group* of work — every currently deletable leaf
//! chain, or a single merge — still inside the lock it allocates each
//! work's resources (a reference-manager reservation), then drops the lock
//! entirely before calling out to the image service. A second, short-held
//! `storage` lock transaction applies whatever the image service reported;
//! resources are released unconditionally once that transaction returns,
//! matching the Python `collect()`'s `try/finally`.
//!
//! `DeleteWork` uses a plain reference-manager reservation rather than a
//! [`StorageChain`] — the chain's `Write` kind asserts its tail is
//! `CREATING` (`spec.md` §4.5), which a row already in `RECYCLING` can never
//! satisfy; the original's `DeleteWork` reuses `StorageChainForWrite`
//! against such a row regardless, which would trip that same assertion.
//! Both merge works that need a fresh row (`MergeCdp`, `MergeQcowTypeB`)
//! insert it as `CREATING` and use the real chain, exactly as grounded.

use std::path::Path;
use std::sync::Arc;

use snapd_adapters::ImageService;
use snapd_core::{Clock, CoreResult, Status, StorageIdent, StorageType, TreeIdent};
use snapd_storage::{NewSnapshotStorage, SnapshotStorage, Store, Transaction};

use crate::chain::{ChainKind, StorageChain};
use crate::graph::{PathOrder, StorageGraph};
use crate::image_path;
use crate::reference_manager::{ReferenceManager, WriteRecord};
use crate::service::{MountChecker, Service};

/// A caller-name-scoped reservation with the reference manager, used by
/// recycling works that don't need a full [`StorageChain`].
struct Reservation {
    reference_manager: Arc<ReferenceManager>,
    caller_name: String,
    active: bool,
}

impl Reservation {
    fn writer(reference_manager: Arc<ReferenceManager>, caller_name: String, record: WriteRecord) -> CoreResult<Self> {
        reference_manager.add_writing(caller_name.clone(), record)?;
        Ok(Self { reference_manager, caller_name, active: true })
    }

    fn release(&mut self) {
        if self.active {
            self.reference_manager.remove(&self.caller_name);
            self.active = false;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.active {
            tracing::warn!(caller_name = %self.caller_name, "recycling reservation dropped without release");
            self.release();
        }
    }
}

pub struct DeleteFileWork {
    target: SnapshotStorage,
    worker_ident: String,
    duplicated: bool,
    reservation: Reservation,
    successful: bool,
}

pub struct DeleteQcowSnapshotWork {
    target: SnapshotStorage,
    reservation: Reservation,
    successful: bool,
}

pub struct MergeCdpWork {
    parent: SnapshotStorage,
    segments: Vec<SnapshotStorage>,
    children: Vec<SnapshotStorage>,
    new_storage: SnapshotStorage,
    chain: StorageChain,
    successful: bool,
}

pub struct MergeQcowTypeAWork {
    merge_storage: SnapshotStorage,
    parent: Option<SnapshotStorage>,
    children: Vec<SnapshotStorage>,
    successful: bool,
}

pub struct MergeQcowTypeBWork {
    merge_storage: SnapshotStorage,
    parent: SnapshotStorage,
    depend_nodes: Vec<SnapshotStorage>,
    children: Vec<SnapshotStorage>,
    new_storage: SnapshotStorage,
    chain: StorageChain,
    successful: bool,
}

/// One planned recycling action, owning whatever resources it must release.
pub enum Work {
    DeleteFile(DeleteFileWork),
    DeleteQcowSnapshot(DeleteQcowSnapshotWork),
    MergeCdp(MergeCdpWork),
    MergeQcowTypeA(MergeQcowTypeAWork),
    MergeQcowTypeB(MergeQcowTypeBWork),
}

impl Work {
    fn alloc_resource(&mut self) -> CoreResult<()> {
        match self {
            Work::DeleteFile(_) | Work::DeleteQcowSnapshot(_) | Work::MergeQcowTypeA(_) => Ok(()),
            Work::MergeCdp(w) => w.chain.acquire(),
            Work::MergeQcowTypeB(w) => w.chain.acquire(),
        }
    }

    fn free_resource(&mut self) {
        match self {
            Work::DeleteFile(w) => w.reservation.release(),
            Work::DeleteQcowSnapshot(w) => w.reservation.release(),
            Work::MergeQcowTypeA(_) => {}
            Work::MergeCdp(w) => w.chain.release(),
            Work::MergeQcowTypeB(w) => w.chain.release(),
        }
    }

    fn is_successful(&self) -> bool {
        match self {
            Work::DeleteFile(w) => w.successful,
            Work::DeleteQcowSnapshot(w) => w.successful,
            Work::MergeCdp(w) => w.successful,
            Work::MergeQcowTypeA(w) => w.successful,
            Work::MergeQcowTypeB(w) => w.successful,
        }
    }

    async fn execute(&mut self, image_service: &dyn ImageService) {
        let result = match self {
            Work::DeleteFile(w) => execute_delete_file(w, image_service).await,
            Work::DeleteQcowSnapshot(w) => image_service.del_snaport(w.target.ident.as_str()).await,
            Work::MergeCdp(w) => {
                let segments: Vec<String> = w.segments.iter().map(|s| s.image_path.clone()).collect();
                image_service.merge_cdp_to_qcow(&segments, &w.new_storage.image_path, "").await
            }
            Work::MergeQcowTypeA(w) => image_service.merge_qcow_hash(&w.merge_storage.image_path, 0).await,
            Work::MergeQcowTypeB(w) => {
                let write_chain: Vec<String> = w.chain.items().iter().map(|i| i.image_path.clone()).collect();
                image_service.move_data_from_qcow(&w.merge_storage.image_path, &write_chain, "", 0).await
            }
        };
        let successful = result.is_ok();
        if let Err(e) = result {
            tracing::warn!(error = %e, "recycling work failed");
        }
        match self {
            Work::DeleteFile(w) => w.successful = successful,
            Work::DeleteQcowSnapshot(w) => w.successful = successful,
            Work::MergeCdp(w) => w.successful = successful,
            Work::MergeQcowTypeA(w) => w.successful = successful,
            Work::MergeQcowTypeB(w) => w.successful = successful,
        }
    }

    fn save_result(&self, txn: &mut Transaction<'_>) -> CoreResult<()> {
        match self {
            Work::DeleteFile(w) => {
                if w.successful {
                    txn.storage_update_status(&w.target, Status::Deleted)?;
                }
            }
            Work::DeleteQcowSnapshot(w) => {
                if w.successful {
                    txn.storage_update_status(&w.target, Status::Deleted)?;
                }
            }
            Work::MergeCdp(w) => {
                if w.successful {
                    advance_new_storage_to_storage(txn, &w.new_storage)?;
                    for child in &w.children {
                        txn.storage_update_parent(child, Some(w.new_storage.ident))?;
                    }
                } else {
                    txn.storage_update_status(&w.new_storage, Status::Abnormal)?;
                }
            }
            Work::MergeQcowTypeA(w) => {
                if w.successful {
                    match &w.parent {
                        None => {
                            let only_child =
                                w.children.first().expect("root merge has exactly one child, enforced at analysis");
                            txn.storage_update_parent(only_child, None)?;
                        }
                        Some(_) => {
                            for child in &w.children {
                                txn.storage_update_parent(child, w.merge_storage.parent_ident)?;
                            }
                        }
                    }
                }
            }
            Work::MergeQcowTypeB(w) => {
                if w.successful {
                    advance_new_storage_to_storage(txn, &w.new_storage)?;
                    for child in &w.children {
                        txn.storage_update_parent(child, Some(w.new_storage.ident))?;
                    }
                } else {
                    txn.storage_update_status(&w.new_storage, Status::Abnormal)?;
                }
            }
        }
        Ok(())
    }
}

/// A merge's freshly inserted target row is born CREATING like any other
/// node; a successful merge is equivalent to that row having been written
/// and hashed already, so it is walked through the same transition table
/// (`spec.md` §3) rather than special-cased into STORAGE directly.
fn advance_new_storage_to_storage(txn: &mut Transaction<'_>, row: &SnapshotStorage) -> CoreResult<()> {
    txn.storage_update_status(row, Status::Writing)?;
    txn.storage_update_status(row, Status::Hashing)?;
    txn.storage_update_status(row, Status::Storage)?;
    Ok(())
}

async fn execute_delete_file(w: &mut DeleteFileWork, image_service: &dyn ImageService) -> CoreResult<()> {
    if w.duplicated {
        tracing::info!(worker_ident = %w.worker_ident, "delete_file_work duplicated, skipping underlying delete");
        return Ok(());
    }
    if w.target.is_cdp() {
        image_service.remove_cdp_file(&w.target.image_path).await
    } else {
        image_service.remove_qcow_file(&w.target.image_path).await
    }
}

/// Outcome of one [`run_once`] pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerOutcome {
    /// The tree has no non-DELETED rows left.
    EmptyTree,
    /// The tree is non-empty but nothing is currently actionable.
    NothingToDo,
    /// A group of works ran; `all_successful` is false if any failed.
    Completed { work_count: usize, all_successful: bool },
}

/// Runs one recycling pass over `tree_ident`.
pub async fn run_once<C: Clock>(service: &Service<C>, tree_ident: TreeIdent) -> CoreResult<PlannerOutcome> {
    let trace = format!("storage_collection:[{tree_ident}],seq:{}", service.next_trace_seq());

    let mut works = match prepare(service, tree_ident, &trace)? {
        None => return Ok(PlannerOutcome::EmptyTree),
        Some(w) if w.is_empty() => return Ok(PlannerOutcome::NothingToDo),
        Some(w) => w,
    };

    for w in &mut works {
        w.execute(service.image_service.as_ref()).await;
    }

    let finalize_result = finalize(service, &trace, &works);

    for w in &mut works {
        w.free_resource();
    }
    finalize_result?;

    let all_successful = works.iter().all(Work::is_successful);
    Ok(PlannerOutcome::Completed { work_count: works.len(), all_successful })
}

fn finalize<C: Clock>(service: &Service<C>, trace: &str, works: &[Work]) -> CoreResult<()> {
    let _guard = service.locker.acquire_storage(trace.to_string());
    let mut txn = service.store.begin(service.now());
    for w in works {
        w.save_result(&mut txn)?;
    }
    txn.commit()
}

fn prepare<C: Clock>(service: &Service<C>, tree_ident: TreeIdent, trace: &str) -> CoreResult<Option<Vec<Work>>> {
    let _guard = service.locker.acquire_storage(trace.to_string());

    let rows = service.store.query_valid_storages(tree_ident);
    if rows.is_empty() {
        return Ok(None);
    }
    let graph = StorageGraph::build(tree_ident, rows)?;

    let deleting = fetch_deleting_storage_objs(&graph, &service.reference_manager, service.mount_checker.as_ref());
    let mut works = if !deleting.is_empty() {
        build_delete_works(&service.store, deleting, trace, service.reference_manager.clone())
    } else if let Some((kind, node)) = find_mergeable(&graph, &service.reference_manager, service.mount_checker.as_ref()) {
        build_merge_works(service, &graph, kind, node, trace)?
    } else {
        Vec::new()
    };

    for i in 0..works.len() {
        if let Err(e) = works[i].alloc_resource() {
            for w in &mut works {
                w.free_resource();
            }
            return Err(e);
        }
    }

    Ok(Some(works))
}

// ---- delete analysis ------------------------------------------------------

fn can_delete(graph: &StorageGraph, reference_manager: &ReferenceManager, mount_checker: &dyn MountChecker, node: &SnapshotStorage) -> bool {
    if node.status != Status::Recycling {
        return false;
    }
    if reference_manager.is_storage_using(node.ident) {
        return false;
    }
    if mount_checker.is_not_mounted(&node.image_path) {
        return false;
    }
    if node.is_qcow() && reference_manager.is_storage_writing(&node.image_path) {
        return false;
    }
    graph.children_of(node.ident).iter().all(|c| c.status == Status::Recycling)
}

/// Walks every leaf toward the root, collecting the longest deletable run.
/// A node reachable from two sibling leaves is only collected once.
fn fetch_deleting_storage_objs(
    graph: &StorageGraph,
    reference_manager: &ReferenceManager,
    mount_checker: &dyn MountChecker,
) -> Vec<SnapshotStorage> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for leaf in graph.leaves() {
        let Ok(path) = graph.path_to_root(leaf.ident, PathOrder::TailToRoot) else { continue };
        for node in path {
            if !can_delete(graph, reference_manager, mount_checker, node) {
                break;
            }
            if seen.insert(node.ident) {
                result.push(node.clone());
            }
        }
    }
    result
}

fn build_delete_works(
    store: &Store,
    rows: Vec<SnapshotStorage>,
    trace: &str,
    reference_manager: Arc<ReferenceManager>,
) -> Vec<Work> {
    let mut seen_worker_idents = std::collections::HashSet::new();
    rows.into_iter()
        .map(|row| {
            let is_qcow_shared = row.is_qcow() && store.count_using_image_path(&row.image_path) > 0;
            if is_qcow_shared {
                let caller_name = format!("{trace} DeleteQcowSnapshotWork {}", row.ident);
                let record = WriteRecord { ident: row.ident, image_path: row.image_path.clone() };
                let reservation = Reservation::writer(reference_manager.clone(), caller_name, record)
                    .expect("recycling reservations are process-unique by construction");
                Work::DeleteQcowSnapshot(DeleteQcowSnapshotWork { target: row, reservation, successful: false })
            } else {
                let worker_ident = format!("{}:delete_file_work", row.image_path);
                let duplicated = !seen_worker_idents.insert(worker_ident.clone());
                let caller_name = format!("{trace} DeleteFileWork {}", row.image_path);
                let record = WriteRecord { ident: row.ident, image_path: row.image_path.clone() };
                let reservation = Reservation::writer(reference_manager.clone(), caller_name, record)
                    .expect("recycling reservations are process-unique by construction");
                Work::DeleteFile(DeleteFileWork { target: row, worker_ident, duplicated, reservation, successful: false })
            }
        })
        .collect()
}

// ---- merge analysis --------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum MergeKind {
    Cdp,
    QcowMoveData,
    QcowRemove,
}

fn classify_merge(
    graph: &StorageGraph,
    reference_manager: &ReferenceManager,
    mount_checker: &dyn MountChecker,
    node: &SnapshotStorage,
) -> Option<MergeKind> {
    if graph.is_root(node.ident) && graph.children_of(node.ident).len() > 1 {
        return None;
    }
    if graph.is_leaf(node.ident) {
        return None;
    }
    if node.status != Status::Recycling {
        return None;
    }

    let parent = graph.parent_of(node.ident);
    if let Some(p) = parent {
        if matches!(p.status, Status::Creating | Status::Writing | Status::Hashing | Status::Abnormal) {
            return None;
        }
    }

    if mount_checker.is_not_mounted(&node.image_path) {
        return None;
    }

    if node.is_cdp() {
        if graph.is_root(node.ident) {
            return None;
        }
        if is_child_depend_with_timestamp(graph, node) {
            return None;
        }
        let parent = parent.expect("non-root cdp node has a parent, enforced by construction");
        if reference_manager.is_storage_writing(&parent.image_path) {
            return None;
        }
        return Some(MergeKind::Cdp);
    }

    if node.file_level_deduplication {
        return None;
    }

    if is_children_in_other_file(graph, node) {
        if graph.is_root(node.ident) {
            return None;
        }
        let parent = parent.expect("non-root node has a parent, enforced by construction");
        if parent.is_cdp() {
            return None;
        }
        if parent.disk_bytes != node.disk_bytes {
            return None;
        }
        if is_multi_snapshot_in_the_qcow(graph, node, parent) {
            return None;
        }
        if reference_manager.is_storage_writing(&parent.image_path) {
            return None;
        }
        return Some(MergeKind::QcowMoveData);
    }

    if reference_manager.is_storage_writing(&node.image_path) {
        return None;
    }
    Some(MergeKind::QcowRemove)
}

fn is_child_depend_with_timestamp(graph: &StorageGraph, node: &SnapshotStorage) -> bool {
    graph.children_of(node.ident).iter().any(|c| c.parent_timestamp.is_some())
}

fn is_children_in_other_file(graph: &StorageGraph, node: &SnapshotStorage) -> bool {
    graph.children_of(node.ident).iter().any(|c| c.image_path != node.image_path)
}

fn is_multi_snapshot_in_the_qcow(graph: &StorageGraph, node: &SnapshotStorage, parent: &SnapshotStorage) -> bool {
    if parent.image_path == node.image_path {
        return true;
    }
    graph.children_of(node.ident).iter().any(|c| c.image_path == node.image_path)
}

fn find_mergeable<'a>(
    graph: &'a StorageGraph,
    reference_manager: &ReferenceManager,
    mount_checker: &dyn MountChecker,
) -> Option<(MergeKind, &'a SnapshotStorage)> {
    for node in graph.nodes_by_bfs() {
        if let Some(kind) = classify_merge(graph, reference_manager, mount_checker, node) {
            return Some((kind, node));
        }
    }
    None
}

fn get_child_node_with_cdp<'a>(graph: &'a StorageGraph, node: &SnapshotStorage) -> Option<&'a SnapshotStorage> {
    graph
        .children_of(node.ident)
        .into_iter()
        .find(|c| !matches!(c.status, Status::Abnormal | Status::Deleted) && !c.is_qcow())
}

fn fetch_merge_cdp_chain(
    graph: &StorageGraph,
    reference_manager: &ReferenceManager,
    mount_checker: &dyn MountChecker,
    start: &SnapshotStorage,
) -> Vec<SnapshotStorage> {
    let mut segments = vec![start.clone()];
    let mut current = start.clone();
    loop {
        let Some(next) = get_child_node_with_cdp(graph, &current) else { break };
        if classify_merge(graph, reference_manager, mount_checker, next) != Some(MergeKind::Cdp) {
            break;
        }
        segments.push(next.clone());
        current = next.clone();
    }
    segments
}

fn build_merge_works<C: Clock>(
    service: &Service<C>,
    graph: &StorageGraph,
    kind: MergeKind,
    node: &SnapshotStorage,
    trace: &str,
) -> CoreResult<Vec<Work>> {
    let reference_manager = &service.reference_manager;
    let mount_checker = service.mount_checker.as_ref();

    match kind {
        MergeKind::Cdp => {
            let parent = graph.parent_of(node.ident).expect("cdp merge node has a parent").clone();
            let segments = fetch_merge_cdp_chain(graph, reference_manager, mount_checker, node);
            let last = segments.last().expect("cdp merge chain always has at least one segment").clone();
            let children: Vec<SnapshotStorage> = graph.children_of(last.ident).into_iter().cloned().collect();

            let new_image_path = if parent.is_cdp() {
                let folder = Path::new(&parent.image_path).parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
                image_path::generate_new_qcow(&folder)
            } else {
                parent.image_path.clone()
            };

            let mut txn = service.store.begin(service.now());
            let new_storage = txn.storage_create(NewSnapshotStorage {
                ident: StorageIdent::generate(),
                parent_ident: Some(parent.ident),
                parent_timestamp: None,
                storage_type: StorageType::Qcow,
                disk_bytes: parent.disk_bytes,
                image_path: new_image_path,
                tree_ident: parent.tree_ident,
                file_level_deduplication: false,
                start_timestamp: Some(service.now()),
                finish_timestamp: None,
            })?;
            txn.commit()?;

            let depend_nodes: Vec<SnapshotStorage> =
                graph.path_to_root(parent.ident, PathOrder::RootToTail)?.into_iter().cloned().collect();

            let caller_name = format!("{trace} MergeCdpWork {}", new_storage.ident);
            let mut chain = StorageChain::new(ChainKind::ReadWrite, reference_manager.clone(), caller_name);
            for n in &depend_nodes {
                chain.insert_tail(n.clone());
            }
            chain.insert_tail(new_storage.clone());

            Ok(vec![Work::MergeCdp(MergeCdpWork { parent, segments, children, new_storage, chain, successful: false })])
        }
        MergeKind::QcowRemove => {
            let parent = graph.parent_of(node.ident).cloned();
            let children: Vec<SnapshotStorage> = graph.children_of(node.ident).into_iter().cloned().collect();
            Ok(vec![Work::MergeQcowTypeA(MergeQcowTypeAWork {
                merge_storage: node.clone(),
                parent,
                children,
                successful: false,
            })])
        }
        MergeKind::QcowMoveData => {
            let parent = graph.parent_of(node.ident).expect("qcow move-data merge node has a parent").clone();
            let children: Vec<SnapshotStorage> = graph.children_of(node.ident).into_iter().cloned().collect();

            let mut txn = service.store.begin(service.now());
            let new_storage = txn.storage_create(NewSnapshotStorage {
                ident: StorageIdent::generate(),
                parent_ident: Some(parent.ident),
                parent_timestamp: None,
                storage_type: StorageType::Qcow,
                disk_bytes: parent.disk_bytes,
                image_path: parent.image_path.clone(),
                tree_ident: parent.tree_ident,
                file_level_deduplication: false,
                start_timestamp: Some(service.now()),
                finish_timestamp: None,
            })?;
            txn.commit()?;

            let depend_nodes: Vec<SnapshotStorage> =
                graph.path_to_root(parent.ident, PathOrder::RootToTail)?.into_iter().cloned().collect();

            let caller_name = format!("{trace} MergeQcowSnapshotTypeBWork {}", new_storage.ident);
            let mut chain = StorageChain::new(ChainKind::Write, reference_manager.clone(), caller_name);
            for n in &depend_nodes {
                chain.insert_tail(n.clone());
            }
            chain.insert_tail(new_storage.clone());

            Ok(vec![Work::MergeQcowTypeB(MergeQcowTypeBWork {
                merge_storage: node.clone(),
                parent,
                depend_nodes,
                children,
                new_storage,
                chain,
                successful: false,
            })])
        }
    }
}

/// Every distinct `tree_ident` with live storage, to drive a process-wide
/// recycling loop over every tree in turn.
pub fn distinct_tree_idents(store: &Store) -> Vec<TreeIdent> {
    store.distinct_tree_idents()
}

#[cfg(test)]
#[path = "recycle_tests.rs"]
mod tests;
