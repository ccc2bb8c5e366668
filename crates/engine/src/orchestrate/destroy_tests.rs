// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::generate_journal::{generate_journal_for_create, generate_journal_for_destroy, NewCreateJournal};
use snapd_adapters::FakeImageService;
use snapd_core::{FakeClock, StorageType};
use snapd_storage::NewSnapshotStorage;
use std::sync::Arc;

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

fn insert_storage(service: &Service<FakeClock>, status: Status) -> StorageIdent {
    let ident = StorageIdent::generate();
    let mut txn = service.store.begin(service.now());
    let row = txn
        .storage_create(NewSnapshotStorage {
            ident,
            parent_ident: None,
            parent_timestamp: None,
            storage_type: StorageType::Qcow,
            disk_bytes: 4096,
            image_path: "/s/x.qcow".into(),
            tree_ident: snapd_core::TreeIdent::generate(),
            file_level_deduplication: false,
            start_timestamp: Some(service.now()),
            finish_timestamp: None,
        })
        .unwrap();
    let mut row = row;
    for step in [Status::Writing, Status::Hashing, Status::Storage] {
        if status == Status::Creating {
            break;
        }
        row = txn.storage_update_status(&row, step).unwrap();
        if step == status {
            break;
        }
    }
    txn.commit().unwrap();
    ident
}

#[test]
fn destroy_marks_storage_row_recycling_and_consumes_journal() {
    let service = new_service();
    let ident = insert_storage(&service, Status::Storage);
    generate_journal_for_destroy(&service.store, service.now(), JournalToken::generate(), &[ident]).unwrap();

    let outcomes = destroy_snapshots(&service).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], DestroyOutcome::Consumed { .. }));

    let row = service.store.storage_by_ident(ident).unwrap();
    assert_eq!(row.status, Status::Recycling);
    assert!(journal::query_unconsumed_destroy(&service.store).unwrap().is_empty());
}

#[test]
fn destroy_defers_when_row_mid_write() {
    let service = new_service();
    let ident = insert_storage(&service, Status::Writing);
    let token = JournalToken::generate();
    generate_journal_for_destroy(&service.store, service.now(), token, &[ident]).unwrap();

    let outcomes = destroy_snapshots(&service).unwrap();
    assert_eq!(outcomes, vec![DestroyOutcome::Deferred { token }]);

    let row = service.store.storage_by_ident(ident).unwrap();
    assert_eq!(row.status, Status::Writing);
    assert_eq!(journal::query_unconsumed_destroy(&service.store).unwrap().len(), 1);
}

#[test]
fn destroy_already_terminal_row_is_left_alone_and_consumed() {
    let service = new_service();
    let ident = insert_storage(&service, Status::Storage);
    {
        let mut txn = service.store.begin(service.now());
        let row = service.store.storage_by_ident(ident).unwrap();
        txn.storage_update_status(&row, Status::Recycling).unwrap();
        txn.commit().unwrap();
    }
    generate_journal_for_destroy(&service.store, service.now(), JournalToken::generate(), &[ident]).unwrap();

    let outcomes = destroy_snapshots(&service).unwrap();
    assert!(matches!(outcomes[0], DestroyOutcome::Consumed { .. }));
    let row = service.store.storage_by_ident(ident).unwrap();
    assert_eq!(row.status, Status::Recycling);
}

#[test]
fn destroy_consumes_pending_create_journal_when_ident_not_in_storage() {
    let service = new_service();
    let ident = StorageIdent::generate();
    generate_journal_for_create(
        &service.store,
        service.now(),
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
    generate_journal_for_destroy(&service.store, service.now(), JournalToken::generate(), &[ident]).unwrap();

    let outcomes = destroy_snapshots(&service).unwrap();
    assert!(matches!(outcomes[0], DestroyOutcome::Consumed { .. }));
    assert!(journal::query_unconsumed_create(&service.store).unwrap().is_empty());
}

#[test]
fn destroy_warns_and_consumes_when_ident_nowhere() {
    let service = new_service();
    let ident = StorageIdent::generate();
    generate_journal_for_destroy(&service.store, service.now(), JournalToken::generate(), &[ident]).unwrap();

    let outcomes = destroy_snapshots(&service).unwrap();
    assert!(matches!(outcomes[0], DestroyOutcome::Consumed { .. }));
}
