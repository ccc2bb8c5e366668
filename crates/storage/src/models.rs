// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row shapes of the two persisted tables (`journal`, `snapshot_storage`) and
//! the inert, never-consumed `hash` table.
//!
//! Grounded verbatim on `data_access/models.py`'s SQLAlchemy models.

use snapd_core::{JournalToken, OperationType, Status, StorageIdent, StorageType, Timestamp, TreeIdent};

/// A snapshot-storage node: one point in a QCOW container or one segment of
/// a CDP journal.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotStorage {
    /// Monotonic surrogate key, distinct from `ident`.
    pub id: u64,
    pub ident: StorageIdent,
    pub parent_ident: Option<StorageIdent>,
    /// Only meaningful when the parent is CDP.
    pub parent_timestamp: Option<Timestamp>,
    pub storage_type: StorageType,
    pub disk_bytes: u64,
    pub status: Status,
    pub image_path: String,
    pub tree_ident: TreeIdent,
    /// Only meaningful on a root QCOW node.
    pub file_level_deduplication: bool,
    pub start_timestamp: Option<Timestamp>,
    pub finish_timestamp: Option<Timestamp>,
}

impl SnapshotStorage {
    pub fn is_qcow(&self) -> bool {
        self.storage_type.is_qcow()
    }

    pub fn is_cdp(&self) -> bool {
        self.storage_type.is_cdp()
    }

    pub fn is_root(&self) -> bool {
        self.parent_ident.is_none()
    }
}

/// Attributes needed to insert a new `SnapshotStorage` row; always inserted
/// in `Status::Creating`.
#[derive(Clone, Debug)]
pub struct NewSnapshotStorage {
    pub ident: StorageIdent,
    pub parent_ident: Option<StorageIdent>,
    pub parent_timestamp: Option<Timestamp>,
    pub storage_type: StorageType,
    pub disk_bytes: u64,
    pub image_path: String,
    pub tree_ident: TreeIdent,
    pub file_level_deduplication: bool,
    pub start_timestamp: Option<Timestamp>,
    pub finish_timestamp: Option<Timestamp>,
}

/// An intent-log entry: a pending CREATE or DESTROY operation, consumed
/// exactly once.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Journal {
    /// Monotonic surrogate key, distinct from `token`; `query_unconsumed`
    /// orders ascending on this field.
    pub id: u64,
    pub token: JournalToken,
    pub operation_type: OperationType,
    /// Opaque payload: for CREATE, the future node's parameters (JSON); for
    /// DESTROY, a comma-joined list of idents.
    pub operation_str: String,
    pub produced_timestamp: Timestamp,
    pub consumed_timestamp: Option<Timestamp>,
    /// CREATE only: idents of nodes created before this journal's node,
    /// whose `parent_ident` must be rewritten once this journal is consumed.
    pub children_idents: Vec<StorageIdent>,
}

impl Journal {
    pub fn is_consumed(&self) -> bool {
        self.consumed_timestamp.is_some()
    }

    /// Comma-joined rendering of `children_idents`, matching the original
    /// column's textual encoding.
    pub fn children_idents_csv(&self) -> String {
        self.children_idents
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Attributes needed to insert a new `Journal` row.
#[derive(Clone, Debug)]
pub struct NewJournal {
    pub token: JournalToken,
    pub operation_type: OperationType,
    pub operation_str: String,
}

/// An auxiliary row referenced by the hash-mode subsystem but never read or
/// written by this core (§6: "referenced but not consumed").
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HashRow {
    pub id: u64,
    pub storage_ident: StorageIdent,
    pub hash_version: u32,
    pub created_timestamp: Timestamp,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
