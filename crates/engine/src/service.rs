// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide context every orchestrator operates against (`spec.md`
//! §9's "global singletons → explicit context" redesign note).
//!
//! The Python implementation reaches singletons (`session.transaction()`,
//! `srm.get_srm()`, `lm.get_journal_locker()`, `pool.generate_handle()`)
//! through module-level globals. This crate instead bundles them into one
//! [`Service`] value that callers construct once and thread through every
//! RPC handler and background task — no global state, easier to test with
//! an isolated `Store::in_memory()` plus [`FakeClock`](snapd_core::FakeClock).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use snapd_adapters::ImageService;
use snapd_core::{Clock, SystemClock, Timestamp};
use snapd_storage::Store;

use crate::handle_pool::HandlePool;
use crate::locker::Locker;
use crate::reference_manager::ReferenceManager;

/// Host-provided predicate answering "is this path outside any mounted
/// filesystem" (`spec.md` §1: deletion of a file on an unmounted device is
/// skipped rather than attempted). Grounded on
/// `cpkt.core.rt.PathInMount.is_in_not_mount`, which this crate cannot
/// reimplement portably — the host wires in the real check.
pub trait MountChecker: Send + Sync {
    fn is_not_mounted(&self, path: &str) -> bool;
}

/// A `MountChecker` that always reports "mounted" — suitable for tests and
/// hosts that never skip deletions.
pub struct AlwaysMounted;

impl MountChecker for AlwaysMounted {
    fn is_not_mounted(&self, _path: &str) -> bool {
        false
    }
}

/// Bundles every piece of shared, process-wide state an orchestrator needs.
/// Cheap to clone: everything inside is already reference-counted or
/// plainly `Sync`.
pub struct Service<C: Clock = SystemClock> {
    pub store: Store,
    pub locker: Locker,
    pub reference_manager: Arc<ReferenceManager>,
    pub handle_pool: HandlePool,
    pub image_service: Arc<dyn ImageService>,
    pub mount_checker: Arc<dyn MountChecker>,
    pub clock: C,
    trace_seq: AtomicU64,
}

impl<C: Clock> Service<C> {
    pub fn new(store: Store, image_service: Arc<dyn ImageService>, clock: C) -> Self {
        Self {
            store,
            locker: Locker::new(),
            reference_manager: Arc::new(ReferenceManager::new()),
            handle_pool: HandlePool::new(),
            image_service,
            mount_checker: Arc::new(AlwaysMounted),
            clock,
            trace_seq: AtomicU64::new(1),
        }
    }

    pub fn with_mount_checker(mut self, mount_checker: Arc<dyn MountChecker>) -> Self {
        self.mount_checker = mount_checker;
        self
    }

    /// The next value in a process-wide monotonic sequence, used to make
    /// trace strings and generated idents unique across concurrent callers
    /// (`spec.md` §4.11).
    pub fn next_trace_seq(&self) -> u64 {
        self.trace_seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.timestamp()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
