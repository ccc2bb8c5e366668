// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image-path generation for new nodes (`spec.md` §4.9), grounded verbatim
//! on `business_logic/storage_action.py`'s `ImagePathGenerator`.

use snapd_storage::SnapshotStorage;
use uuid::Uuid;

use crate::reference_manager::ReferenceManager;

/// `folder/new_ident.cdp` — CDP nodes never share a file.
pub fn generate_cdp(folder: &str, new_ident: &str) -> String {
    join(folder, &format!("{new_ident}.cdp"))
}

/// Chooses a QCOW image path for a new node under `parent`.
///
/// A root node (no parent) always gets a fresh file. A child node reuses
/// its parent's file unless any of: the requested size differs from the
/// parent's, the parent isn't itself QCOW, `folder` differs from the
/// parent's directory, or the parent's file is currently being written by
/// someone else — any one of those forces a fresh file.
pub fn generate_qcow(
    parent: Option<&SnapshotStorage>,
    folder: &str,
    new_disk_bytes: u64,
    reference_manager: &ReferenceManager,
) -> String {
    let Some(parent) = parent else {
        return generate_new_qcow(folder);
    };

    let parent_folder = std::path::Path::new(&parent.image_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let needs_new_file = new_disk_bytes != parent.disk_bytes
        || !parent.is_qcow()
        || folder != parent_folder
        || reference_manager.is_storage_writing(&parent.image_path);

    if needs_new_file {
        generate_new_qcow(folder)
    } else {
        parent.image_path.clone()
    }
}

/// `folder/<fresh uuid>.qcow`.
pub fn generate_new_qcow(folder: &str) -> String {
    join(folder, &format!("{}.qcow", Uuid::new_v4().simple()))
}

fn join(folder: &str, name: &str) -> String {
    let mut path = std::path::PathBuf::from(folder);
    path.push(name);
    path.to_string_lossy().to_string()
}

#[cfg(test)]
#[path = "image_path_tests.rs"]
mod tests;
