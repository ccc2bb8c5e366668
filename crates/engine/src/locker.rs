// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two named, process-wide reentrant locks (`journal`, `storage`) with
//! trace-stack annotations (`spec.md` §4.1).
//!
//! Grounded verbatim on `business_logic/locker_manager.py`
//! (`LockWithTrace`/`LockerManager`): each acquire pushes a trace string
//! onto a stack kept alongside the lock, each release pops it, and a debug
//! event fires when the stack transitions empty↔non-empty. `journal` is
//! always acquired before `storage` when both are needed.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;

struct NamedLock {
    name: &'static str,
    mutex: ReentrantMutex<RefCell<Vec<String>>>,
}

impl NamedLock {
    fn new(name: &'static str) -> Self {
        Self { name, mutex: ReentrantMutex::new(RefCell::new(Vec::new())) }
    }

    fn acquire(&self, trace: impl Into<String>) -> LockGuard<'_> {
        let guard = self.mutex.lock();
        let was_empty = guard.borrow().is_empty();
        guard.borrow_mut().push(trace.into());
        if was_empty {
            tracing::debug!(lock = self.name, "lock contended->held");
        }
        LockGuard { name: self.name, guard }
    }
}

/// Held while a named lock's trace is on the stack; releases (and logs) on
/// drop.
pub struct LockGuard<'a> {
    name: &'static str,
    guard: ReentrantMutexGuard<'a, RefCell<Vec<String>>>,
}

impl<'a> Drop for LockGuard<'a> {
    fn drop(&mut self) {
        self.guard.borrow_mut().pop();
        if self.guard.borrow().is_empty() {
            tracing::debug!(lock = self.name, "lock held->free");
        }
    }
}

impl<'a> LockGuard<'a> {
    /// Current trace stack, outermost first — for diagnostics.
    pub fn trace_stack(&self) -> Vec<String> {
        self.guard.borrow().clone()
    }
}

/// Bundles the two process-wide named locks.
pub struct Locker {
    journal: NamedLock,
    storage: NamedLock,
}

impl Default for Locker {
    fn default() -> Self {
        Self::new()
    }
}

impl Locker {
    pub fn new() -> Self {
        Self { journal: NamedLock::new("journal"), storage: NamedLock::new("storage") }
    }

    pub fn acquire_journal(&self, trace: impl Into<String>) -> LockGuard<'_> {
        self.journal.acquire(trace)
    }

    pub fn acquire_storage(&self, trace: impl Into<String>) -> LockGuard<'_> {
        self.storage.acquire(trace)
    }

    /// Acquires both locks in the mandated order (journal, then storage).
    pub fn acquire_both(&self, trace: impl Into<String>) -> (LockGuard<'_>, LockGuard<'_>) {
        let trace = trace.into();
        let j = self.journal.acquire(trace.clone());
        let s = self.storage.acquire(trace);
        (j, s)
    }
}

#[cfg(test)]
#[path = "locker_tests.rs"]
mod tests;
