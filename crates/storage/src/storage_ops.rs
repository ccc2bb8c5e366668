// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence-layer snapshot-storage operations (`spec.md` §4.2), grounded
//! verbatim on `data_access/storage.py`.

use snapd_core::{CoreError, CoreResult, Status, StorageIdent, TreeIdent};

use crate::models::{NewSnapshotStorage, SnapshotStorage};
use crate::store::{Store, StoreEvent, Transaction};

impl Store {
    /// Fetches a storage row by its surrogate id.
    pub fn storage_by_id(&self, id: u64) -> Option<SnapshotStorage> {
        self.read().storages.get(&id).cloned()
    }

    /// Fetches a storage row by its unique ident.
    pub fn storage_by_ident(&self, ident: StorageIdent) -> Option<SnapshotStorage> {
        let state = self.read();
        let id = state.storage_by_ident.get(&ident)?;
        state.storages.get(id).cloned()
    }

    /// All rows of `tree_ident` with status ≠ DELETED.
    pub fn query_valid_storages(&self, tree_ident: TreeIdent) -> Vec<SnapshotStorage> {
        self.read()
            .storages
            .values()
            .filter(|s| s.tree_ident == tree_ident && s.status.counts_as_existing())
            .cloned()
            .collect()
    }

    /// Rows with status ∉ {DELETED, RECYCLING} sharing `image_path` — "is
    /// this file currently in active use".
    pub fn count_using_image_path(&self, image_path: &str) -> usize {
        self.read()
            .storages
            .values()
            .filter(|s| s.image_path == image_path && s.status.counts_as_using())
            .count()
    }

    /// Rows with status ≠ DELETED sharing `image_path`.
    pub fn count_exist_image_path(&self, image_path: &str) -> usize {
        self.read()
            .storages
            .values()
            .filter(|s| s.image_path == image_path && s.status.counts_as_existing())
            .count()
    }

    /// Every distinct `tree_ident` with at least one non-DELETED row —
    /// drives the recycling loop's per-tree scan.
    pub fn distinct_tree_idents(&self) -> Vec<TreeIdent> {
        let mut seen = std::collections::HashSet::new();
        let mut idents = Vec::new();
        for s in self.read().storages.values() {
            if s.status.counts_as_existing() && seen.insert(s.tree_ident) {
                idents.push(s.tree_ident);
            }
        }
        idents
    }
}

impl<'a> Transaction<'a> {
    /// Inserts a new storage row in `Status::Creating`.
    pub fn storage_create(&mut self, new: NewSnapshotStorage) -> CoreResult<SnapshotStorage> {
        if self.store().storage_by_ident(new.ident).is_some() {
            return Err(CoreError::state_conflict(format!(
                "storage ident already exists: {}",
                new.ident
            )));
        }
        let id = self.store().next_storage_id();
        let row = SnapshotStorage {
            id,
            ident: new.ident,
            parent_ident: new.parent_ident,
            parent_timestamp: new.parent_timestamp,
            storage_type: new.storage_type,
            disk_bytes: new.disk_bytes,
            status: Status::Creating,
            image_path: new.image_path,
            tree_ident: new.tree_ident,
            file_level_deduplication: new.file_level_deduplication,
            start_timestamp: new.start_timestamp,
            finish_timestamp: new.finish_timestamp,
        };
        self.record(StoreEvent::StorageCreated(row.clone()));
        Ok(row)
    }

    /// Transitions a row's status. Asserts the transition is legal per
    /// [`Status::can_transition_from`].
    pub fn storage_update_status(
        &mut self,
        row: &SnapshotStorage,
        new_status: Status,
    ) -> CoreResult<SnapshotStorage> {
        let current = self
            .storage_by_id(row.id)
            .ok_or_else(|| CoreError::not_found(format!("storage id {}", row.id)))?;
        if !new_status.can_transition_from(current.status) {
            return Err(CoreError::state_conflict(format!(
                "illegal transition {} -> {} for {}",
                current.status, new_status, current.ident
            )));
        }
        self.record(StoreEvent::StorageStatusChanged { id: row.id, status: new_status });
        let mut updated = current;
        updated.status = new_status;
        Ok(updated)
    }

    /// Rewrites a row's `parent_ident` (used when consuming an out-of-order
    /// CREATE journal, §4.8).
    pub fn storage_update_parent(
        &mut self,
        row: &SnapshotStorage,
        parent_ident: Option<StorageIdent>,
    ) -> CoreResult<SnapshotStorage> {
        let current = self
            .storage_by_id(row.id)
            .ok_or_else(|| CoreError::not_found(format!("storage id {}", row.id)))?;
        self.record(StoreEvent::StorageParentChanged { id: row.id, parent_ident });
        let mut updated = current;
        updated.parent_ident = parent_ident;
        Ok(updated)
    }
}

#[cfg(test)]
#[path = "storage_ops_tests.rs"]
mod tests;
