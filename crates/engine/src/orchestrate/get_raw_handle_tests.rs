// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::chain::{ChainKind, StorageChain};
use snapd_adapters::FakeImageService;
use snapd_core::{FakeClock, Status, StorageType};
use snapd_storage::NewSnapshotStorage;
use std::sync::Arc;

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

fn insert_storage_row(service: &Service<FakeClock>) -> snapd_storage::SnapshotStorage {
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
    row
}

#[tokio::test]
async fn get_raw_handle_opens_deferred_reader() {
    let service = new_service();
    let row = insert_storage_row(&service);
    let record = service.handle_pool.insert("h1", false, "trace".to_string(), service.now()).unwrap();
    let mut chain = StorageChain::new(ChainKind::Read, service.reference_manager.clone(), "h1".to_string());
    chain.insert_tail(row);
    chain.acquire().unwrap();
    record.set_chain(chain);

    assert_eq!(record.raw_handle(), 0);
    let got = get_raw_handle(&service, "h1").await.unwrap();
    assert_ne!(got.raw_handle(), 0);
}

#[tokio::test]
async fn get_raw_handle_is_noop_when_already_open() {
    let service = new_service();
    let row = insert_storage_row(&service);
    let record = service.handle_pool.insert("h2", false, "trace".to_string(), service.now()).unwrap();
    let mut chain = StorageChain::new(ChainKind::Read, service.reference_manager.clone(), "h2".to_string());
    chain.insert_tail(row);
    chain.acquire().unwrap();
    record.set_chain(chain);

    let first = get_raw_handle(&service, "h2").await.unwrap();
    let raw = first.raw_handle();
    let second = get_raw_handle(&service, "h2").await.unwrap();
    assert_eq!(second.raw_handle(), raw);
}

#[tokio::test]
async fn get_raw_handle_unknown_handle_fails() {
    let service = new_service();
    let err = get_raw_handle(&service, "nope").await.unwrap_err();
    assert_eq!(err.code(), snapd_core::code::NOT_FOUND);
}
