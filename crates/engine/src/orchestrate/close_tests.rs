// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::chain::{ChainKind, StorageChain};
use crate::handle_pool::Handle;
use snapd_adapters::FakeImageService;
use snapd_core::{FakeClock, StorageType};
use snapd_storage::NewSnapshotStorage;
use std::sync::Arc;

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

fn insert_writing_storage(service: &Service<FakeClock>) -> SnapshotStorage {
    let mut txn = service.store.begin(service.now());
    let row = txn
        .storage_create(NewSnapshotStorage {
            ident: snapd_core::StorageIdent::generate(),
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
    let row = txn.storage_update_status(&row, Status::Writing).unwrap();
    txn.commit().unwrap();
    row
}

async fn insert_writer_handle(service: &Service<FakeClock>, handle: &str) -> Arc<Handle> {
    let row = insert_writing_storage(service);
    let record = service.handle_pool.insert(handle, true, "trace".to_string(), service.now()).unwrap();
    let mut chain = StorageChain::new(ChainKind::Write, service.reference_manager.clone(), handle.to_string());
    chain.insert_tail(row);
    chain.acquire().unwrap();
    record.set_chain(chain);
    record
}

#[tokio::test]
async fn close_writer_transitions_tail_to_hashing() {
    let service = new_service();
    let record = insert_writer_handle(&service, "h1").await;
    let ident = record.with_chain(|c| c.tail().ident).unwrap();

    close_snapshot(&service, "h1").await.unwrap();

    let row = service.store.storage_by_ident(ident).unwrap();
    assert_eq!(row.status, Status::Hashing);
    assert!(service.handle_pool.get("h1").is_err());
}

#[tokio::test]
async fn close_reader_just_destroys_handle() {
    let service = new_service();
    let mut txn = service.store.begin(service.now());
    let row = txn
        .storage_create(NewSnapshotStorage {
            ident: snapd_core::StorageIdent::generate(),
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
    let row = txn.storage_update_status(&row, Status::Writing).unwrap();
    let row = txn.storage_update_status(&row, Status::Hashing).unwrap();
    let row = txn.storage_update_status(&row, Status::Storage).unwrap();
    txn.commit().unwrap();

    let record = service.handle_pool.insert("h2", false, "trace".to_string(), service.now()).unwrap();
    let mut chain = StorageChain::new(ChainKind::Read, service.reference_manager.clone(), "h2".to_string());
    chain.insert_tail(row.clone());
    chain.acquire().unwrap();
    record.set_chain(chain);

    close_snapshot(&service, "h2").await.unwrap();

    let refreshed = service.store.storage_by_ident(row.ident).unwrap();
    assert_eq!(refreshed.status, Status::Storage);
    assert!(service.handle_pool.get("h2").is_err());
}

#[tokio::test]
async fn close_unknown_handle_fails_not_found() {
    let service = new_service();
    let err = close_snapshot(&service, "missing").await.unwrap_err();
    assert_eq!(err.code(), snapd_core::code::NOT_FOUND);
}
