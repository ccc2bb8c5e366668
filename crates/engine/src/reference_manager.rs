// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory registry of active readers/writers, keyed by image-path and by
//! snapshot-ident (`spec.md` §4.3).
//!
//! Grounded verbatim on `business_logic/storage_reference_manager.py`:
//! two maps keyed by `caller_name`, each protected by its own reader-writer
//! lock, with memoized `is_storage_using`/`is_storage_writing` queries
//! invalidated on every mutation.

use parking_lot::RwLock;
use snapd_core::{CoreError, CoreResult, StorageIdent};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ReadRecord {
    pub ident: StorageIdent,
    pub image_path: String,
}

#[derive(Clone, Debug)]
pub struct WriteRecord {
    pub ident: StorageIdent,
    pub image_path: String,
}

struct Memo {
    used_idents: std::collections::HashSet<StorageIdent>,
    writing_paths: std::collections::HashSet<String>,
}

/// Mediates per-file and per-snapshot exclusion across all live chains.
pub struct ReferenceManager {
    readers: RwLock<HashMap<String, Vec<ReadRecord>>>,
    writers: RwLock<HashMap<String, WriteRecord>>,
    memo: RwLock<Memo>,
}

impl Default for ReferenceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceManager {
    pub fn new() -> Self {
        Self {
            readers: RwLock::new(HashMap::new()),
            writers: RwLock::new(HashMap::new()),
            memo: RwLock::new(Memo {
                used_idents: std::collections::HashSet::new(),
                writing_paths: std::collections::HashSet::new(),
            }),
        }
    }

    /// Registers `caller_name` as reading `items`. A caller_name appears at
    /// most once in the reading table.
    pub fn add_reading(&self, caller_name: impl Into<String>, items: Vec<ReadRecord>) {
        self.readers.write().insert(caller_name.into(), items);
        self.recompute_memo();
    }

    /// Registers `caller_name` as writing `item`. Fails with
    /// `ReferenceRepeated` if another writer already holds `item.image_path`
    /// — the exclusion is on the image file, not the snapshot.
    pub fn add_writing(&self, caller_name: impl Into<String>, item: WriteRecord) -> CoreResult<()> {
        let caller_name = caller_name.into();
        let mut writers = self.writers.write();
        if let Some(existing) = writers
            .iter()
            .find(|(name, rec)| **name != caller_name && rec.image_path == item.image_path)
        {
            return Err(CoreError::reference_repeated(format!(
                "image_path {} already held by writer {}",
                item.image_path, existing.0
            )));
        }
        writers.insert(caller_name, item);
        drop(writers);
        self.recompute_memo();
        Ok(())
    }

    /// Removes `caller_name`'s reader and writer records, if any.
    pub fn remove(&self, caller_name: &str) {
        self.readers.write().remove(caller_name);
        self.writers.write().remove(caller_name);
        self.recompute_memo();
    }

    /// True iff any reader or writer record carries `ident`.
    pub fn is_storage_using(&self, ident: StorageIdent) -> bool {
        self.memo.read().used_idents.contains(&ident)
    }

    /// True iff some writer record carries `image_path`.
    pub fn is_storage_writing(&self, image_path: &str) -> bool {
        self.memo.read().writing_paths.contains(image_path)
    }

    fn recompute_memo(&self) {
        let readers = self.readers.read();
        let writers = self.writers.read();
        let mut used_idents = std::collections::HashSet::new();
        let mut writing_paths = std::collections::HashSet::new();
        for recs in readers.values() {
            for r in recs {
                used_idents.insert(r.ident);
            }
        }
        for rec in writers.values() {
            used_idents.insert(rec.ident);
            writing_paths.insert(rec.image_path.clone());
        }
        drop(readers);
        drop(writers);
        *self.memo.write() = Memo { used_idents, writing_paths };
    }
}

#[cfg(test)]
#[path = "reference_manager_tests.rs"]
mod tests;
