// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-addressed registry of in-flight create/open handles (`spec.md`
//! §4.6).
//!
//! Grounded verbatim on `business_logic/handle_pool.py`: a process-wide map
//! from the caller-chosen handle string to a `Handle` record, each guarded
//! by its own mutex so that `get_raw_handle`'s deferred open doesn't race a
//! concurrent `close_snapshot` on the same handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use snapd_adapters::{Endpoint, ImageService, RawHandle};
use snapd_core::{CoreError, CoreResult, Timestamp};

use crate::chain::StorageChain;

struct HandleInner {
    chain: Option<StorageChain>,
    raw_handle: RawHandle,
    endpoint: Option<Endpoint>,
    hash_mode: Option<u32>,
}

/// One in-flight create/open/RW operation. Alive from the moment the
/// orchestrator inserts it into the pool until `close_snapshot` (or a
/// failed create/open) destroys it.
pub struct Handle {
    pub handle: String,
    pub writing: bool,
    pub raw_flag: String,
    pub created_timestamp: Timestamp,
    inner: Mutex<HandleInner>,
    /// Serializes the deferred-open sequence in `get_raw_handle` (check
    /// `raw_handle()==0`, call the image service, `set_raw`) so two
    /// concurrent callers on the same reader handle don't both open a raw
    /// handle and race on which one sticks. A `tokio::sync::Mutex` rather
    /// than `parking_lot`'s, since its guard is held across an `.await`.
    raw_open_lock: tokio::sync::Mutex<()>,
}

impl Handle {
    fn new(handle: String, writing: bool, raw_flag: String, created_timestamp: Timestamp) -> Self {
        Self {
            handle,
            writing,
            raw_flag,
            created_timestamp,
            inner: Mutex::new(HandleInner { chain: None, raw_handle: 0, endpoint: None, hash_mode: None }),
            raw_open_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Assigns this handle's chain. Orchestrators call this once, after
    /// `insert`, under the journal+storage locks.
    pub fn set_chain(&self, chain: StorageChain) {
        self.inner.lock().chain = Some(chain);
    }

    /// Records a freshly opened raw handle and its endpoint.
    pub fn set_raw(&self, raw_handle: RawHandle, endpoint: Endpoint) {
        let mut inner = self.inner.lock();
        inner.raw_handle = raw_handle;
        inner.endpoint = Some(endpoint);
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.inner.lock().raw_handle
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.lock().endpoint.clone()
    }

    /// Records a hash mode for this handle (`set_hash_mode` RPC). Inert
    /// until the hash-mode subsystem is built out.
    pub fn set_hash_mode(&self, hash_mode: u32) {
        self.inner.lock().hash_mode = Some(hash_mode);
    }

    pub fn hash_mode(&self) -> Option<u32> {
        self.inner.lock().hash_mode
    }

    /// Runs `f` against the chain, if one has been assigned yet.
    pub fn with_chain<T>(&self, f: impl FnOnce(&StorageChain) -> T) -> Option<T> {
        self.inner.lock().chain.as_ref().map(f)
    }

    /// Holds this handle's deferred-open critical section for the duration
    /// of `f`, so only one caller at a time can check-then-open its raw
    /// handle.
    pub async fn with_raw_open_lock<T, Fut>(&self, f: impl FnOnce() -> Fut) -> T
    where
        Fut: std::future::Future<Output = T>,
    {
        let _guard = self.raw_open_lock.lock().await;
        f().await
    }

    /// Closes the raw handle (if one was opened) and releases the chain
    /// (if one was assigned), in that order. The chain is released even if
    /// closing the raw handle fails — a leaked chain blocks recycling
    /// forever, a leaked raw handle is the image service's problem.
    pub async fn destroy(&self, image_service: &dyn ImageService) -> CoreResult<()> {
        let (raw_handle, endpoint) = {
            let inner = self.inner.lock();
            (inner.raw_handle, inner.endpoint.clone())
        };
        let close_result = if raw_handle != 0 {
            match &endpoint {
                Some(endpoint) => image_service.close(raw_handle, endpoint, true).await,
                None => {
                    tracing::error!(raw_handle, "raw handle set without a recorded endpoint, skipping close");
                    Ok(())
                }
            }
        } else {
            Ok(())
        };

        let chain = self.inner.lock().chain.take();
        if let Some(mut chain) = chain {
            chain.release();
        }

        close_result
    }
}

/// Process-wide handle registry.
#[derive(Default)]
pub struct HandlePool {
    handles: RwLock<HashMap<String, Arc<Handle>>>,
}

impl HandlePool {
    pub fn new() -> Self {
        Self { handles: RwLock::new(HashMap::new()) }
    }

    /// Inserts a new handle. Fails if `handle` is already in use.
    pub fn insert(
        &self,
        handle: impl Into<String>,
        writing: bool,
        raw_flag: impl Into<String>,
        created_timestamp: Timestamp,
    ) -> CoreResult<Arc<Handle>> {
        let handle = handle.into();
        let mut handles = self.handles.write();
        if handles.contains_key(&handle) {
            return Err(CoreError::state_conflict(format!("handle already in use: {handle}")));
        }
        let record = Arc::new(Handle::new(handle.clone(), writing, raw_flag.into(), created_timestamp));
        handles.insert(handle, record.clone());
        Ok(record)
    }

    pub fn get(&self, handle: &str) -> CoreResult<Arc<Handle>> {
        self.handles
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("handle {handle}")))
    }

    /// Removes `handle` from the pool (if present) and destroys it.
    /// A missing handle is a no-op, matching the idempotent destroy
    /// expected from the exception-handling paths that call this
    /// unconditionally.
    pub async fn destroy(&self, handle: &str, image_service: &dyn ImageService) -> CoreResult<()> {
        let record = self.handles.write().remove(handle);
        match record {
            Some(record) => record.destroy(image_service).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "handle_pool_tests.rs"]
mod tests;
