// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-storage: strongly-typed CRUD persistence for `Journal` and
//! `SnapshotStorage` rows, durable via a write-ahead log.

pub mod journal_ops;
pub mod models;
pub mod storage_ops;
pub mod store;

pub use models::{HashRow, Journal, NewJournal, NewSnapshotStorage, SnapshotStorage};
pub use store::{Store, StoreEvent, Transaction};
