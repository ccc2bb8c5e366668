// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `generate_journal_for_create`/`generate_journal_for_destroy` (`spec.md`
//! §6), grounded verbatim on `service_logic/generate_journal.py`: both just
//! insert a journal row inside a transaction, no named lock needed since
//! nothing else can observe a token before its row exists.

use snapd_core::{JournalToken, OperationType, StorageIdent, StorageType, Timestamp};
use snapd_storage::{NewJournal, Store};

use crate::journal::CreateParams;

/// Arguments for `generate_journal_for_create` — mirrors
/// `idd.GenerateJournalForCreateParams`.
#[derive(Clone, Debug)]
pub struct NewCreateJournal {
    pub journal_token: JournalToken,
    pub new_ident: StorageIdent,
    pub parent_ident: Option<StorageIdent>,
    pub parent_timestamp: Option<Timestamp>,
    pub new_type: StorageType,
    pub new_storage_folder: String,
    pub new_disk_bytes: u64,
    /// Defaults to `1`, matching `new_hash_version = fields.Integer(missing=1)`.
    pub new_hash_version: u32,
}

/// Records the intent to create a node. Fails with `StateConflict` if the
/// token is already in use.
pub fn generate_journal_for_create(store: &Store, now: Timestamp, params: NewCreateJournal) -> snapd_core::CoreResult<()> {
    let payload = CreateParams {
        new_ident: params.new_ident,
        parent_ident: params.parent_ident,
        parent_timestamp: params.parent_timestamp,
        new_type: params.new_type,
        new_storage_folder: params.new_storage_folder,
        new_disk_bytes: params.new_disk_bytes,
        new_hash_version: params.new_hash_version,
    };
    let operation_str = serde_json::to_string(&payload)
        .map_err(|e| snapd_core::CoreError::Validation(format!("serializing create journal payload: {e}")))?;

    let mut txn = store.begin(now);
    txn.journal_create(NewJournal { token: params.journal_token, operation_type: OperationType::Create, operation_str })?;
    txn.commit()
}

/// Records the intent to destroy one or more nodes. `idents` must be
/// non-empty.
pub fn generate_journal_for_destroy(
    store: &Store,
    now: Timestamp,
    journal_token: JournalToken,
    idents: &[StorageIdent],
) -> snapd_core::CoreResult<()> {
    if idents.is_empty() {
        return Err(snapd_core::CoreError::Validation("generate_journal_for_destroy: idents must be non-empty".into()));
    }
    let operation_str = idents.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(",");

    let mut txn = store.begin(now);
    txn.journal_create(NewJournal { token: journal_token, operation_type: OperationType::Destroy, operation_str })?;
    txn.commit()
}

#[cfg(test)]
#[path = "generate_journal_tests.rs"]
mod tests;
