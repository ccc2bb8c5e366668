// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use snapd_core::Timestamp;
use snapd_storage::Store;

#[test]
fn create_journal_rejects_duplicate_token() {
    let store = Store::in_memory();
    let token = JournalToken::generate();
    let params = NewCreateJournal {
        journal_token: token,
        new_ident: StorageIdent::generate(),
        parent_ident: None,
        parent_timestamp: None,
        new_type: StorageType::Qcow,
        new_storage_folder: "/s".into(),
        new_disk_bytes: 1024,
        new_hash_version: 1,
    };
    generate_journal_for_create(&store, Timestamp::from_micros(0), params.clone()).unwrap();
    let err = generate_journal_for_create(&store, Timestamp::from_micros(0), params).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::STATE_CONFLICT);
}

#[test]
fn destroy_journal_rejects_empty_idents() {
    let store = Store::in_memory();
    let err =
        generate_journal_for_destroy(&store, Timestamp::from_micros(0), JournalToken::generate(), &[]).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::VALIDATION);
}

#[test]
fn destroy_journal_joins_idents_csv() {
    let store = Store::in_memory();
    let a = StorageIdent::generate();
    let b = StorageIdent::generate();
    generate_journal_for_destroy(&store, Timestamp::from_micros(0), JournalToken::generate(), &[a, b]).unwrap();

    let row = store.query_unconsumed_journals(Some(OperationType::Destroy), None).remove(0);
    assert_eq!(row.operation_str, format!("{a},{b}"));
}

#[test]
fn create_journal_round_trips_params() {
    let store = Store::in_memory();
    let ident = StorageIdent::generate();
    generate_journal_for_create(
        &store,
        Timestamp::from_micros(0),
        NewCreateJournal {
            journal_token: JournalToken::generate(),
            new_ident: ident,
            parent_ident: None,
            parent_timestamp: None,
            new_type: StorageType::Qcow,
            new_storage_folder: "/s".into(),
            new_disk_bytes: 4096,
            new_hash_version: 1,
        },
    )
    .unwrap();

    let row = store.query_unconsumed_journals(Some(OperationType::Create), None).remove(0);
    let parsed: CreateParams = serde_json::from_str(&row.operation_str).unwrap();
    assert_eq!(parsed.new_ident, ident);
    assert_eq!(parsed.new_disk_bytes, 4096);
}
