// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-core: shared identifiers, clock, error vocabulary, and status
//! machinery for the disk-snapshot storage service.

pub mod macros;

pub mod clock;
pub mod error;
pub mod id;
pub mod status;

pub use clock::{Clock, FakeClock, SystemClock, Timestamp};
pub use error::{code, CoreError, CoreResult};
pub use id::{short, IdBuf, JournalToken, StorageIdent, TreeIdent, HEX_ID_LEN};
pub use status::{OperationType, Status, StorageType};
