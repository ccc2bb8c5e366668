// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`ImageService`] used by engine/daemon tests, gated behind
//! the `test-support` feature — mirrors the teacher's
//! fake-adapter-behind-a-feature convention.

use async_trait::async_trait;
use parking_lot::Mutex;
use snapd_core::CoreResult;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::image_service::{Endpoint, ImageService, RawHandle};

/// Records every call made to it, for assertions in orchestrator tests.
#[derive(Default)]
pub struct FakeImageService {
    next_handle: AtomicI64,
    open_handles: Mutex<HashSet<RawHandle>>,
    pub calls: Mutex<Vec<String>>,
    /// When set, `create`/`open` fail with this message instead of
    /// succeeding — used to exercise orchestrator rollback paths.
    pub fail_next: Mutex<Option<String>>,
}

impl FakeImageService {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicI64::new(1),
            open_handles: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next.lock().take()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn is_open(&self, handle: RawHandle) -> bool {
        self.open_handles.lock().contains(&handle)
    }
}

#[async_trait]
impl ImageService for FakeImageService {
    async fn create(
        &self,
        target: &str,
        parents: &[String],
        disk_bytes: u64,
        flag: &str,
    ) -> CoreResult<(RawHandle, Endpoint)> {
        self.log(format!("create({target}, {parents:?}, {disk_bytes}, {flag})"));
        if let Some(msg) = self.take_failure() {
            return Err(snapd_core::CoreError::external(msg));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.open_handles.lock().insert(handle);
        Ok((handle, Endpoint(format!("fake://{target}"))))
    }

    async fn open(&self, chain: &[String], flag: &str) -> CoreResult<(RawHandle, Endpoint)> {
        self.log(format!("open({chain:?}, {flag})"));
        if let Some(msg) = self.take_failure() {
            return Err(snapd_core::CoreError::external(msg));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.open_handles.lock().insert(handle);
        Ok((handle, Endpoint(format!("fake://{}", chain.join(",")))))
    }

    async fn close(&self, raw_handle: RawHandle, endpoint: &Endpoint, sync: bool) -> CoreResult<()> {
        self.log(format!("close({raw_handle}, {endpoint}, {sync})"));
        self.open_handles.lock().remove(&raw_handle);
        Ok(())
    }

    async fn del_snaport(&self, image_ident: &str) -> CoreResult<()> {
        self.log(format!("del_snaport({image_ident})"));
        Ok(())
    }

    async fn move_data_from_qcow(
        &self,
        merge_storage: &str,
        write_chain: &[String],
        flag: &str,
        hash_version: u32,
    ) -> CoreResult<()> {
        self.log(format!("move_data_from_qcow({merge_storage}, {write_chain:?}, {flag}, {hash_version})"));
        Ok(())
    }

    async fn merge_cdp_to_qcow(&self, cdp_segments: &[String], base: &str, flag: &str) -> CoreResult<()> {
        self.log(format!("merge_cdp_to_qcow({cdp_segments:?}, {base}, {flag})"));
        Ok(())
    }

    async fn merge_qcow_hash(&self, target: &str, hash_version: u32) -> CoreResult<()> {
        self.log(format!("merge_qcow_hash({target}, {hash_version})"));
        Ok(())
    }

    async fn remove_cdp_file(&self, path: &str) -> CoreResult<()> {
        self.log(format!("remove_cdp_file({path})"));
        Ok(())
    }

    async fn remove_qcow_file(&self, path: &str) -> CoreResult<()> {
        self.log(format!("remove_qcow_file({path})"));
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
