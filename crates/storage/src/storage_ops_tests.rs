// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::Store;
use snapd_core::{StorageIdent, StorageType, Timestamp, TreeIdent};

fn new_row(tree: TreeIdent) -> NewSnapshotStorage {
    NewSnapshotStorage {
        ident: StorageIdent::generate(),
        parent_ident: None,
        parent_timestamp: None,
        storage_type: StorageType::Qcow,
        disk_bytes: 1024,
        image_path: "/s/a.qcow".into(),
        tree_ident: tree,
        file_level_deduplication: false,
        start_timestamp: None,
        finish_timestamp: None,
    }
}

#[test]
fn create_inserts_in_creating_status() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let mut txn = store.begin(Timestamp::from_micros(0));
    let row = txn.storage_create(new_row(tree)).expect("create");
    txn.commit().unwrap();
    assert_eq!(row.status, Status::Creating);
    assert_eq!(store.storage_by_ident(row.ident).unwrap().status, Status::Creating);
}

#[test]
fn create_rejects_duplicate_ident() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let new = new_row(tree);
    let ident = new.ident;
    let mut txn = store.begin(Timestamp::from_micros(0));
    txn.storage_create(new).unwrap();
    txn.commit().unwrap();

    let mut txn2 = store.begin(Timestamp::from_micros(0));
    let dup = NewSnapshotStorage { ident, ..new_row(tree) };
    let err = txn2.storage_create(dup).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::STATE_CONFLICT);
}

#[test]
fn status_transition_follows_table() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let mut txn = store.begin(Timestamp::from_micros(0));
    let row = txn.storage_create(new_row(tree)).unwrap();
    let row = txn.storage_update_status(&row, Status::Writing).expect("legal");
    txn.commit().unwrap();
    assert_eq!(row.status, Status::Writing);
}

#[test]
fn illegal_status_transition_is_rejected() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let mut txn = store.begin(Timestamp::from_micros(0));
    let row = txn.storage_create(new_row(tree)).unwrap();
    let err = txn.storage_update_status(&row, Status::Storage).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::STATE_CONFLICT);
}

#[test]
fn update_parent_rewrites_parent_ident() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let mut txn = store.begin(Timestamp::from_micros(0));
    let parent = txn.storage_create(new_row(tree)).unwrap();
    let child = txn.storage_create(new_row(tree)).unwrap();
    let child = txn.storage_update_parent(&child, Some(parent.ident)).expect("reparent");
    txn.commit().unwrap();
    assert_eq!(child.parent_ident, Some(parent.ident));
}

#[test]
fn count_using_excludes_deleted_and_recycling() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let path = "/s/shared.qcow";
    let mut txn = store.begin(Timestamp::from_micros(0));
    let a = NewSnapshotStorage { image_path: path.into(), ..new_row(tree) };
    let b = NewSnapshotStorage { image_path: path.into(), ..new_row(tree) };
    let a = txn.storage_create(a).unwrap();
    let _b = txn.storage_create(b).unwrap();
    let a = txn.storage_update_status(&a, Status::Writing).unwrap();
    let a = txn.storage_update_status(&a, Status::Hashing).unwrap();
    let a = txn.storage_update_status(&a, Status::Storage).unwrap();
    let _a = txn.storage_update_status(&a, Status::Recycling).unwrap();
    txn.commit().unwrap();

    // a is RECYCLING (doesn't count as using), b is CREATING (counts as using, exists)
    assert_eq!(store.count_using_image_path(path), 1);
    assert_eq!(store.count_exist_image_path(path), 2);
}

#[test]
fn query_valid_excludes_deleted() {
    let store = Store::in_memory();
    let tree = TreeIdent::generate();
    let mut txn = store.begin(Timestamp::from_micros(0));
    let row = txn.storage_create(new_row(tree)).unwrap();
    txn.commit().unwrap();
    assert_eq!(store.query_valid_storages(tree).len(), 1);
    let _ = row;
}
