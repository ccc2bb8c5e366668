// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-engine: the locker, reference manager, storage graph/chain, handle
//! pool, journal typed views, create/destroy/open/close orchestrators, and
//! recycling planner that together implement the disk-snapshot storage
//! service's core guarantees.

pub mod chain;
pub mod generate_journal;
pub mod graph;
pub mod handle_pool;
pub mod image_path;
pub mod journal;
pub mod locker;
pub mod orchestrate;
pub mod recycle;
pub mod reference_manager;
pub mod service;

pub use chain::{ChainKind, StorageChain};
pub use generate_journal::{generate_journal_for_create, generate_journal_for_destroy, NewCreateJournal};
pub use graph::{PathOrder, StorageGraph};
pub use handle_pool::{Handle, HandlePool};
pub use locker::Locker;
pub use orchestrate::{
    close_snapshot, create_snapshot, destroy_snapshots, get_raw_handle, open_snapshot, set_hash_mode,
    CreateSnapshotParams, DestroyOutcome, OpenSnapshotParams,
};
pub use recycle::{run_once as recycle_once, PlannerOutcome as RecyclingOutcome};
pub use reference_manager::ReferenceManager;
pub use service::{AlwaysMounted, MountChecker, Service};
