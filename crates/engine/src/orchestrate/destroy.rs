// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background processing of unconsumed DESTROY journals (`spec.md` §4.7),
//! grounded verbatim on `service_logic/consume_journal.py`'s `DestroyJournal`.
//!
//! Unlike the other five operations this isn't triggered by an inbound RPC:
//! a caller only ever asks to *record* a destroy intent
//! ([`generate_journal_for_destroy`](crate::generate_journal_for_destroy));
//! actually retiring nodes is driven by a periodic scan calling
//! [`destroy_snapshots`], matching the Python implementation's lack of a
//! direct `destroy_snapshot` RPC.

use snapd_core::{Clock, CoreResult, JournalToken, Status, StorageIdent, Timestamp};
use snapd_storage::{Store, Transaction};

use crate::journal::{self, DestroyInJournal};
use crate::locker::Locker;
use crate::service::Service;

/// Result of processing one DESTROY journal during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Every ident was either transitioned to RECYCLING, found already
    /// retired, or matched and consumed a still-pending CREATE journal —
    /// this DESTROY journal is now itself consumed.
    Consumed { token: JournalToken },
    /// At least one ident names a row mid-creation/write/hash; the whole
    /// journal is left unconsumed for the next scan.
    Deferred { token: JournalToken },
}

/// Processes every currently unconsumed DESTROY journal once.
pub fn destroy_snapshots<C: Clock>(service: &Service<C>) -> CoreResult<Vec<DestroyOutcome>> {
    let now = service.now();
    let trace = format!("destroy storage scan #{}", service.next_trace_seq());
    let pending = journal::query_unconsumed_destroy(&service.store)?;

    let mut outcomes = Vec::with_capacity(pending.len());
    for dj in &pending {
        outcomes.push(destroy_one(&service.store, &service.locker, now, dj, &trace)?);
    }
    Ok(outcomes)
}

enum StorageOutcome {
    Handled,
    NotFound,
    Defer,
}

fn destroy_one(
    store: &Store,
    locker: &Locker,
    now: Timestamp,
    dj: &DestroyInJournal,
    trace: &str,
) -> CoreResult<DestroyOutcome> {
    let (_jguard, _sguard) = locker.acquire_both(trace.to_string());
    let mut txn = store.begin(now);

    let mut fully_handled = true;
    for &ident in &dj.idents {
        match deal_in_storage(store, &mut txn, ident)? {
            StorageOutcome::Handled => continue,
            StorageOutcome::Defer => {
                fully_handled = false;
                continue;
            }
            StorageOutcome::NotFound => {}
        }

        if !deal_in_journal(store, &mut txn, ident)? {
            tracing::warn!(%ident, token = %dj.row.token, "destroy target not found in storage or any unconsumed create journal");
        }
    }

    if fully_handled {
        txn.journal_consume(&dj.row)?;
    }
    txn.commit()?;

    Ok(if fully_handled {
        DestroyOutcome::Consumed { token: dj.row.token }
    } else {
        DestroyOutcome::Deferred { token: dj.row.token }
    })
}

fn deal_in_storage(store: &Store, txn: &mut Transaction<'_>, ident: StorageIdent) -> CoreResult<StorageOutcome> {
    let Some(row) = store.storage_by_ident(ident) else {
        return Ok(StorageOutcome::NotFound);
    };
    match row.status {
        Status::Storage => {
            txn.storage_update_status(&row, Status::Recycling)?;
            tracing::info!(%ident, "set RECYCLING, destroy requested");
            Ok(StorageOutcome::Handled)
        }
        Status::Abnormal | Status::Deleted | Status::Recycling => {
            tracing::warn!(%ident, status = %row.status, "destroy target already terminal, leaving status as-is");
            Ok(StorageOutcome::Handled)
        }
        Status::Creating | Status::Writing | Status::Hashing => Ok(StorageOutcome::Defer),
    }
}

/// `ident` isn't (yet) a storage row — it may still name a node whose
/// CREATE journal hasn't been consumed. If so, that journal is consumed
/// without ever producing its node.
fn deal_in_journal(store: &Store, txn: &mut Transaction<'_>, ident: StorageIdent) -> CoreResult<bool> {
    let unconsumed = journal::query_unconsumed_create(store)?;
    let Some(found) = unconsumed.iter().find(|jn| jn.params.new_ident == ident) else {
        return Ok(false);
    };
    txn.journal_consume(&found.row)?;
    tracing::info!(token = %found.row.token, %ident, "pending create journal will not produce its node, destroyed first");
    Ok(true)
}

#[cfg(test)]
#[path = "destroy_tests.rs"]
mod tests;
