// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use snapd_adapters::FakeImageService;
use snapd_core::{FakeClock, StorageIdent, StorageType, TreeIdent};
use snapd_storage::{NewSnapshotStorage, Store};

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

#[tokio::test]
async fn sweep_once_on_an_empty_store_touches_nothing() {
    let service = new_service();
    sweep_once(&service).await;
}

#[tokio::test]
async fn sweep_once_visits_every_distinct_tree() {
    let service = new_service();
    let tree_a = TreeIdent::generate();
    let tree_b = TreeIdent::generate();
    for tree_ident in [tree_a, tree_b] {
        let mut txn = service.store.begin(service.now());
        txn.storage_create(NewSnapshotStorage {
            ident: StorageIdent::generate(),
            parent_ident: None,
            parent_timestamp: None,
            storage_type: StorageType::Qcow,
            disk_bytes: 4096,
            image_path: format!("/s/{tree_ident}.qcow2"),
            tree_ident,
            file_level_deduplication: false,
            start_timestamp: Some(service.now()),
            finish_timestamp: None,
        })
        .unwrap();
        txn.commit().unwrap();
    }

    // Neither tree has a RECYCLING row yet, so the sweep should complete
    // without panicking and without mutating either tree's only row.
    sweep_once(&service).await;
    assert_eq!(distinct_tree_idents(&service.store).len(), 2);
}
