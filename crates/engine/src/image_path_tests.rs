// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use snapd_core::{StorageIdent, StorageType, TreeIdent};

fn parent_row(disk_bytes: u64, storage_type: StorageType, image_path: &str) -> SnapshotStorage {
    SnapshotStorage {
        id: 1,
        ident: StorageIdent::generate(),
        parent_ident: None,
        parent_timestamp: None,
        storage_type,
        disk_bytes,
        status: snapd_core::Status::Storage,
        image_path: image_path.into(),
        tree_ident: TreeIdent::generate(),
        file_level_deduplication: true,
        start_timestamp: None,
        finish_timestamp: None,
    }
}

#[test]
fn generate_cdp_joins_ident_with_cdp_suffix() {
    assert_eq!(generate_cdp("/s", "abc123"), "/s/abc123.cdp");
}

#[test]
fn generate_qcow_root_always_gets_fresh_file() {
    let rm = ReferenceManager::new();
    let path = generate_qcow(None, "/s", 1024, &rm);
    assert!(path.starts_with("/s/"));
    assert!(path.ends_with(".qcow"));
}

#[test]
fn generate_qcow_reuses_parent_file_when_compatible() {
    let rm = ReferenceManager::new();
    let parent = parent_row(1024, StorageType::Qcow, "/s/shared.qcow");
    let path = generate_qcow(Some(&parent), "/s", 1024, &rm);
    assert_eq!(path, "/s/shared.qcow");
}

#[test]
fn generate_qcow_forks_on_disk_bytes_mismatch() {
    let rm = ReferenceManager::new();
    let parent = parent_row(1024, StorageType::Qcow, "/s/shared.qcow");
    let path = generate_qcow(Some(&parent), "/s", 2048, &rm);
    assert_ne!(path, "/s/shared.qcow");
}

#[test]
fn generate_qcow_forks_when_parent_is_cdp() {
    let rm = ReferenceManager::new();
    let parent = parent_row(1024, StorageType::Cdp, "/s/shared.cdp");
    let path = generate_qcow(Some(&parent), "/s", 1024, &rm);
    assert_ne!(path, "/s/shared.cdp");
    assert!(path.ends_with(".qcow"));
}

#[test]
fn generate_qcow_forks_on_folder_mismatch() {
    let rm = ReferenceManager::new();
    let parent = parent_row(1024, StorageType::Qcow, "/s/shared.qcow");
    let path = generate_qcow(Some(&parent), "/other", 1024, &rm);
    assert!(path.starts_with("/other/"));
}

#[test]
fn generate_qcow_forks_when_parent_file_is_being_written() {
    let rm = ReferenceManager::new();
    let parent = parent_row(1024, StorageType::Qcow, "/s/shared.qcow");
    rm.add_writing(
        "other-writer",
        crate::reference_manager::WriteRecord { ident: parent.ident, image_path: parent.image_path.clone() },
    )
    .unwrap();
    let path = generate_qcow(Some(&parent), "/s", 1024, &rm);
    assert_ne!(path, "/s/shared.qcow");
}
