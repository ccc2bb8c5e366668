// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot-storage status, storage type, journal operation type, and the
//! status-transition table.
//!
//! Grounded verbatim on `data_access/storage.py`'s `_status_transition` dict.

use crate::simple_display;

/// Lifecycle status of a `SnapshotStorage` row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Creating,
    Writing,
    Hashing,
    Storage,
    Abnormal,
    Recycling,
    Deleted,
}

simple_display! {
    Status {
        Creating => "CREATING",
        Writing => "WRITING",
        Hashing => "HASHING",
        Storage => "STORAGE",
        Abnormal => "ABNORMAL",
        Recycling => "RECYCLING",
        Deleted => "DELETED",
    }
}

impl Status {
    /// Allowed source statuses for a transition into `self`. Any transition
    /// not covered by this table is illegal.
    pub fn allowed_sources(self) -> &'static [Status] {
        use Status::*;
        match self {
            Creating => &[],
            Writing => &[Creating],
            Hashing => &[Writing],
            Storage => &[Hashing],
            Recycling => &[Storage],
            Abnormal => &[Creating, Writing, Hashing, Recycling],
            Deleted => &[Recycling, Abnormal],
        }
    }

    /// True iff transitioning from `from` to `self` is legal.
    pub fn can_transition_from(self, from: Status) -> bool {
        self.allowed_sources().contains(&from)
    }

    /// Statuses outside of which a row is still considered "in use"
    /// (`count_using`, §4.2): status ∉ {DELETED, RECYCLING}.
    pub fn counts_as_using(self) -> bool {
        !matches!(self, Status::Deleted | Status::Recycling)
    }

    /// Statuses counted by `count_exist` (§4.2): status ≠ DELETED.
    pub fn counts_as_existing(self) -> bool {
        self != Status::Deleted
    }
}

/// Physical snapshot format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Qcow,
    Cdp,
}

simple_display! {
    StorageType {
        Qcow => "qcow",
        Cdp => "cdp",
    }
}

impl StorageType {
    pub fn is_qcow(self) -> bool {
        matches!(self, StorageType::Qcow)
    }

    pub fn is_cdp(self) -> bool {
        matches!(self, StorageType::Cdp)
    }
}

/// Kind of intent recorded by a journal row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Create,
    Destroy,
}

simple_display! {
    OperationType {
        Create => "CREATE",
        Destroy => "DESTROY",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
