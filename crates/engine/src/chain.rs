// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, acquire/release-guarded views over a contiguous parent path of
//! `SnapshotStorage` rows (`spec.md` §4.5).
//!
//! Grounded verbatim on `business_logic/storage_chain.py`: a base class
//! shared by `StorageChainForRead`/`StorageChainForWrite`/`StorageChainForRW`,
//! collapsed here into one [`StorageChain`] carrying a [`ChainKind`] tag —
//! the three Python subclasses differ only in which reference-manager calls
//! `acquire`/`release` make and in one extra validity check, which this
//! type expresses as a match on `kind` rather than three near-duplicate
//! classes.
//!
//! A chain is not re-entrant: [`StorageChain::acquire`] may be called once,
//! and every acquired chain must eventually be released. A chain still
//! holding its registration when dropped is a bug — `Drop` logs a warning
//! and releases it, mirroring the Python `__del__`.

use std::sync::Arc;

use snapd_core::{CoreError, CoreResult, Status};
use snapd_storage::SnapshotStorage;

use crate::reference_manager::{ReadRecord, ReferenceManager, WriteRecord};

/// Which reference-manager registrations a chain makes on `acquire`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChainKind {
    /// Registers a reading record over its key items.
    Read,
    /// Registers a writing record over its tail item only.
    Write,
    /// Registers both: a reading record over its key items and a writing
    /// record over its tail item.
    ReadWrite,
}

struct Acquired {
    key_items: Vec<SnapshotStorage>,
    write_key_items: Vec<SnapshotStorage>,
}

/// A chain of `SnapshotStorage` rows ordered root-to-tail, sharing one
/// parent path. Built by repeated [`insert_tail`](Self::insert_tail) (or
/// [`insert_head`](Self::insert_head)) before the first and only
/// [`acquire`](Self::acquire).
pub struct StorageChain {
    kind: ChainKind,
    caller_name: String,
    items: Vec<SnapshotStorage>,
    reference_manager: Arc<ReferenceManager>,
    acquired: Option<Acquired>,
}

impl StorageChain {
    pub fn new(
        kind: ChainKind,
        reference_manager: Arc<ReferenceManager>,
        caller_name: impl Into<String>,
    ) -> Self {
        Self { kind, caller_name: caller_name.into(), items: Vec::new(), reference_manager, acquired: None }
    }

    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn caller_name(&self) -> &str {
        &self.caller_name
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `row` at the tail. Not valid once acquired.
    pub fn insert_tail(&mut self, row: SnapshotStorage) -> &mut Self {
        debug_assert!(self.acquired.is_none(), "insert_tail on an acquired chain");
        self.items.push(row);
        self
    }

    /// Prepends `row` at the root. Not valid once acquired.
    pub fn insert_head(&mut self, row: SnapshotStorage) -> &mut Self {
        debug_assert!(self.acquired.is_none(), "insert_head on an acquired chain");
        self.items.insert(0, row);
        self
    }

    /// The tail item — the node being created, written, or recycled.
    /// Panics if the chain is empty; every chain is built with at least one
    /// item before use.
    pub fn tail(&self) -> &SnapshotStorage {
        self.items.last().expect("storage chain has at least one item")
    }

    /// All items in the chain, root-to-tail order. Only meaningful once
    /// acquired.
    pub fn items(&self) -> &[SnapshotStorage] {
        &self.items
    }

    /// The key items selected for opening/reading — see module docs.
    /// Only meaningful once acquired.
    pub fn key_items(&self) -> &[SnapshotStorage] {
        self.acquired.as_ref().map(|a| a.key_items.as_slice()).unwrap_or(&[])
    }

    /// The key items selected for writing: the tail alone for CDP, or the
    /// subset of key items sharing the tail's image_path for QCOW. Only
    /// meaningful on [`ChainKind::Write`]/[`ChainKind::ReadWrite`] chains,
    /// once acquired.
    pub fn write_key_items(&self) -> &[SnapshotStorage] {
        self.acquired.as_ref().map(|a| a.write_key_items.as_slice()).unwrap_or(&[])
    }

    /// Validates the chain, selects its key items, and registers them with
    /// the reference manager. Not re-entrant: calling twice without an
    /// intervening [`release`](Self::release) is a bug. Any failure leaves
    /// the chain released.
    pub fn acquire(&mut self) -> CoreResult<()> {
        debug_assert!(self.acquired.is_none(), "chain acquired twice");
        match self.try_acquire() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }

    fn try_acquire(&mut self) -> CoreResult<()> {
        if self.is_empty() {
            return Err(CoreError::graph_integrity("storage chain is empty"));
        }

        match self.kind {
            ChainKind::Read => {
                for item in &self.items {
                    if matches!(item.status, Status::Creating | Status::Abnormal | Status::Deleted) {
                        return Err(CoreError::state_conflict(format!(
                            "invalid read chain, storage {} is {}",
                            item.ident, item.status
                        )));
                    }
                }
            }
            ChainKind::Write | ChainKind::ReadWrite => {
                let tail = self.tail();
                if tail.status != Status::Creating {
                    return Err(CoreError::state_conflict(format!(
                        "invalid write chain, tail {} is {} (expected CREATING)",
                        tail.ident, tail.status
                    )));
                }
            }
        }

        let key_items = self.select_key_items()?;
        let write_key_items = match self.kind {
            ChainKind::Write | ChainKind::ReadWrite => self.select_write_key_items(&key_items),
            ChainKind::Read => Vec::new(),
        };

        match self.kind {
            ChainKind::Read => {
                self.reference_manager.add_reading(self.caller_name.clone(), to_read_records(&key_items));
            }
            ChainKind::Write => {
                self.reference_manager.add_writing(self.caller_name.clone(), to_write_record(self.tail()))?;
            }
            ChainKind::ReadWrite => {
                self.reference_manager.add_reading(self.caller_name.clone(), to_read_records(&key_items));
                self.reference_manager.add_writing(self.caller_name.clone(), to_write_record(self.tail()))?;
            }
        }

        self.acquired = Some(Acquired { key_items, write_key_items });
        Ok(())
    }

    /// An item is "key" iff it is the tail, a root with file-level
    /// deduplication, its image_path differs from the next item's, or the
    /// next item is WRITING.
    fn select_key_items(&self) -> CoreResult<Vec<SnapshotStorage>> {
        let mut key_items = Vec::new();
        let tail_index = self.items.len() - 1;
        for (i, item) in self.items.iter().enumerate() {
            debug_assert!(
                !matches!(item.status, Status::Deleted | Status::Abnormal),
                "chain item {} is {}",
                item.ident,
                item.status
            );

            if i == tail_index {
                key_items.push(item.clone());
                continue;
            }
            if i == 0 && item.file_level_deduplication {
                if item.parent_ident.is_some() {
                    return Err(CoreError::graph_integrity(format!(
                        "file_level_deduplication root {} has a parent",
                        item.ident
                    )));
                }
                key_items.push(item.clone());
                continue;
            }
            let next = &self.items[i + 1];
            if item.image_path != next.image_path {
                key_items.push(item.clone());
                continue;
            }
            if next.status == Status::Writing {
                key_items.push(item.clone());
            }
        }
        Ok(key_items)
    }

    fn select_write_key_items(&self, key_items: &[SnapshotStorage]) -> Vec<SnapshotStorage> {
        let tail = self.tail();
        if tail.is_cdp() {
            vec![tail.clone()]
        } else {
            key_items.iter().filter(|item| item.image_path == tail.image_path).cloned().collect()
        }
    }

    /// Deregisters the chain from the reference manager, if acquired.
    /// Idempotent — a second call is a no-op.
    pub fn release(&mut self) {
        if self.acquired.is_none() {
            return;
        }
        self.reference_manager.remove(&self.caller_name);
        self.acquired = None;
    }
}

impl Drop for StorageChain {
    fn drop(&mut self) {
        if self.acquired.is_some() {
            tracing::warn!(caller_name = %self.caller_name, "storage chain dropped without release");
            self.release();
        }
    }
}

fn to_read_records(items: &[SnapshotStorage]) -> Vec<ReadRecord> {
    items.iter().map(|item| ReadRecord { ident: item.ident, image_path: item.image_path.clone() }).collect()
}

fn to_write_record(item: &SnapshotStorage) -> WriteRecord {
    WriteRecord { ident: item.ident, image_path: item.image_path.clone() }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
