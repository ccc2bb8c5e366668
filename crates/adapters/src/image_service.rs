// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external image-service contract (`spec.md` §6): the lower-level
//! collaborator that actually creates/opens/closes/merges/deletes image
//! files. This core only calls it; it is out of scope to implement.
//!
//! Grounded on `business_logic/storage_action.py`'s `DiskSnapshotAction`
//! static methods (the call shapes) and the teacher's
//! adapter-trait-plus-fake pattern.

use async_trait::async_trait;
use snapd_core::CoreResult;

/// An opaque, round-trippable endpoint string identifying where to re-reach
/// the image service for a raw handle (`proxy↔string`, per §6).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Endpoint(pub String);

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw handle returned by the image service, valid only alongside its
/// [`Endpoint`].
pub type RawHandle = i64;

/// The external image-service contract. Implementations perform real I/O;
/// callers in `snapd-engine` must never invoke this trait while holding a
/// named lock (`spec.md` §5's single most important invariant).
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Creates a new image file (or snapshot point within one) at `target`,
    /// descending from `parents` (QCOW: key items minus the new tail; CDP:
    /// always empty).
    async fn create(
        &self,
        target: &str,
        parents: &[String],
        disk_bytes: u64,
        flag: &str,
    ) -> CoreResult<(RawHandle, Endpoint)>;

    /// Opens a chain (ordered key-item paths) for reading or writing.
    async fn open(&self, chain: &[String], flag: &str) -> CoreResult<(RawHandle, Endpoint)>;

    /// Closes a previously opened raw handle, reconnecting to the same
    /// `endpoint` it was created/opened against.
    async fn close(&self, raw_handle: RawHandle, endpoint: &Endpoint, sync: bool) -> CoreResult<()>;

    /// Removes one snapshot point from a (possibly shared) QCOW file.
    async fn del_snaport(&self, image_ident: &str) -> CoreResult<()>;

    /// Moves a QCOW snapshot point's data into a new, separate file (type-B
    /// merge).
    async fn move_data_from_qcow(
        &self,
        merge_storage: &str,
        write_chain: &[String],
        flag: &str,
        hash_version: u32,
    ) -> CoreResult<()>;

    /// Merges a run of CDP segments into their QCOW base.
    async fn merge_cdp_to_qcow(&self, cdp_segments: &[String], base: &str, flag: &str) -> CoreResult<()>;

    /// Recomputes content hashes after a merge (hash-mode subsystem; see
    /// `spec.md` §9 Open Question on `set_hash_mode`).
    async fn merge_qcow_hash(&self, target: &str, hash_version: u32) -> CoreResult<()>;

    /// Deletes a standalone CDP file.
    async fn remove_cdp_file(&self, path: &str) -> CoreResult<()>;

    /// Deletes a standalone QCOW file (only when no snapshot points remain
    /// in it).
    async fn remove_qcow_file(&self, path: &str) -> CoreResult<()>;
}
