// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error vocabulary.
//!
//! One variant per error kind named in the service's error-handling design:
//! validation failures, not-found lookups, illegal state transitions, graph
//! corruption, reference-exclusion violations, and external collaborator
//! failures. Each kind carries a stable numeric code so RPC responses can
//! surface a machine-readable error alongside the human message.
//!
//! `DelayDeal` is deliberately not a variant here — it never reaches a
//! caller; see `snapd_engine::orchestrate::destroy::DestroyOutcome`.

use thiserror::Error;

/// Stable numeric error codes, surfaced to RPC callers.
pub mod code {
    pub const VALIDATION: u32 = 1000;
    pub const NOT_FOUND: u32 = 1001;
    pub const STATE_CONFLICT: u32 = 1002;
    pub const GRAPH_INTEGRITY: u32 = 1003;
    pub const REFERENCE_REPEATED: u32 = 1004;
    pub const EXTERNAL: u32 = 1005;
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("graph integrity violated: {0}")]
    GraphIntegrity(String),

    #[error("reference already held: {0}")]
    ReferenceRepeated(String),

    #[error("external image service error: {0}")]
    External(String),
}

impl CoreError {
    /// Stable numeric code for this error kind, for RPC responses.
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation(_) => code::VALIDATION,
            Self::NotFound(_) => code::NOT_FOUND,
            Self::StateConflict(_) => code::STATE_CONFLICT,
            Self::GraphIntegrity(_) => code::GRAPH_INTEGRITY,
            Self::ReferenceRepeated(_) => code::REFERENCE_REPEATED,
            Self::External(_) => code::EXTERNAL,
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn state_conflict(what: impl std::fmt::Display) -> Self {
        Self::StateConflict(what.to_string())
    }

    pub fn graph_integrity(what: impl std::fmt::Display) -> Self {
        Self::GraphIntegrity(what.to_string())
    }

    pub fn reference_repeated(what: impl std::fmt::Display) -> Self {
        Self::ReferenceRepeated(what.to_string())
    }

    pub fn external(what: impl std::fmt::Display) -> Self {
        Self::External(what.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
