// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed views over a generic [`snapd_storage::Journal`] row (`spec.md`
//! §4.8), grounded verbatim on `business_logic/journal.py`
//! (`CreateInJournal`/`DestroyInJournal`).
//!
//! A raw `Journal` row's `operation_str` is an opaque payload; these types
//! parse it according to `operation_type` and assert the row really is of
//! that kind.

use snapd_core::{CoreError, CoreResult, JournalToken, OperationType, StorageIdent, StorageType, Timestamp};
use snapd_storage::{Journal, SnapshotStorage, Store, Transaction};

use crate::locker::Locker;

/// Parameters recorded for a CREATE journal entry — the future node's
/// attributes, serialized as JSON in `operation_str`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CreateParams {
    pub new_ident: StorageIdent,
    pub parent_ident: Option<StorageIdent>,
    pub parent_timestamp: Option<Timestamp>,
    pub new_type: StorageType,
    pub new_storage_folder: String,
    pub new_disk_bytes: u64,
    pub new_hash_version: u32,
}

/// A CREATE journal row together with its parsed parameters.
#[derive(Clone, Debug)]
pub struct CreateInJournal {
    pub row: Journal,
    pub params: CreateParams,
}

impl CreateInJournal {
    /// Wraps `row`, asserting it is a CREATE entry and parsing its payload.
    pub fn from_row(row: Journal) -> CoreResult<Self> {
        if row.operation_type != OperationType::Create {
            return Err(CoreError::state_conflict(format!(
                "journal {} is not a CREATE entry",
                row.token
            )));
        }
        let params: CreateParams = serde_json::from_str(&row.operation_str)
            .map_err(|e| CoreError::state_conflict(format!("corrupt CREATE journal {}: {e}", row.token)))?;
        Ok(Self { row, params })
    }

    pub fn is_root(&self) -> bool {
        self.params.parent_ident.is_none()
    }

    pub fn is_cdp(&self) -> bool {
        self.params.new_type.is_cdp()
    }

    pub fn is_qcow(&self) -> bool {
        self.params.new_type.is_qcow()
    }

    pub fn children_idents(&self) -> &[StorageIdent] {
        &self.row.children_idents
    }

    /// Storage rows already present for this journal's recorded children —
    /// nodes created before their parent, whose `parent_ident` must be
    /// rewritten once this journal's node is actually created.
    pub fn children_storages(&self, store: &Store) -> Vec<SnapshotStorage> {
        self.row
            .children_idents
            .iter()
            .filter_map(|ident| store.storage_by_ident(*ident))
            .collect()
    }

    /// Appends `ident` to this journal's `children_idents`, persisting the
    /// change and refreshing `self.row`.
    pub fn append_child(&mut self, txn: &mut Transaction<'_>, ident: StorageIdent) -> CoreResult<()> {
        let mut children = self.row.children_idents.clone();
        children.push(ident);
        self.row = txn.journal_alter_children(&self.row, children)?;
        Ok(())
    }

    /// Among `candidates`, the first whose `new_ident` is `self`'s
    /// `parent_ident` — i.e. the still-unconsumed CREATE journal that would
    /// produce this node's parent, if any.
    pub fn find_parent_in_journals<'a>(
        &self,
        candidates: &'a [CreateInJournal],
    ) -> Option<&'a CreateInJournal> {
        let parent_ident = self.params.parent_ident?;
        candidates.iter().find(|jn| jn.params.new_ident == parent_ident)
    }
}

/// Parameters recorded for a DESTROY journal entry: the idents to retire.
#[derive(Clone, Debug)]
pub struct DestroyInJournal {
    pub row: Journal,
    pub idents: Vec<StorageIdent>,
}

impl DestroyInJournal {
    /// Wraps `row`, asserting it is a DESTROY entry and parsing its
    /// comma-joined payload.
    pub fn from_row(row: Journal) -> CoreResult<Self> {
        if row.operation_type != OperationType::Destroy {
            return Err(CoreError::state_conflict(format!(
                "journal {} is not a DESTROY entry",
                row.token
            )));
        }
        let idents = row
            .operation_str
            .split(',')
            .filter(|s| !s.is_empty())
            .map(StorageIdent::from_str_checked)
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { row, idents })
    }
}

/// Fetches the journal identified by `token`, asserts it hasn't already been
/// consumed, and marks it consumed — grounded on `business_logic/journal.py`
/// `consume()`. Takes the journal lock itself; callers must not already hold
/// it.
fn consume(store: &Store, locker: &Locker, now: Timestamp, token: JournalToken, trace: impl Into<String>) -> CoreResult<Journal> {
    let _guard = locker.acquire_journal(trace);
    let row = store
        .journal_by_token(token)
        .ok_or_else(|| CoreError::not_found(format!("journal token {token}")))?;
    let mut txn = store.begin(now);
    let consumed = txn.journal_consume(&row)?;
    txn.commit()?;
    Ok(consumed)
}

/// Consumes the CREATE journal for `token`, returning its typed view.
pub fn consume_create(
    store: &Store,
    locker: &Locker,
    now: Timestamp,
    token: JournalToken,
    trace: impl Into<String>,
) -> CoreResult<CreateInJournal> {
    CreateInJournal::from_row(consume(store, locker, now, token, trace)?)
}

/// Consumes the DESTROY journal for `token`, returning its typed view.
pub fn consume_destroy(
    store: &Store,
    locker: &Locker,
    now: Timestamp,
    token: JournalToken,
    trace: impl Into<String>,
) -> CoreResult<DestroyInJournal> {
    DestroyInJournal::from_row(consume(store, locker, now, token, trace)?)
}

/// All unconsumed CREATE journals, oldest first.
pub fn query_unconsumed_create(store: &Store) -> CoreResult<Vec<CreateInJournal>> {
    store
        .query_unconsumed_journals(Some(OperationType::Create), None)
        .into_iter()
        .map(CreateInJournal::from_row)
        .collect()
}

/// Unconsumed CREATE journals strictly older than `before.row.id` — used
/// when resolving a CDP node's out-of-order QCOW parent (§4.8).
pub fn query_unconsumed_create_before(store: &Store, before: &CreateInJournal) -> CoreResult<Vec<CreateInJournal>> {
    store
        .query_unconsumed_journals(Some(OperationType::Create), Some(before.row.id))
        .into_iter()
        .map(CreateInJournal::from_row)
        .collect()
}

/// All unconsumed DESTROY journals, oldest first.
pub fn query_unconsumed_destroy(store: &Store) -> CoreResult<Vec<DestroyInJournal>> {
    store
        .query_unconsumed_journals(Some(OperationType::Destroy), None)
        .into_iter()
        .map(DestroyInJournal::from_row)
        .collect()
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
