// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background recycling loop (`spec.md` §1's "background recycling loop"
//! and §4.9's planner) — the daemon-side driver that repeatedly calls
//! `snapd_engine::recycle_once` for every live tree, since the core crate
//! intentionally has no scheduler of its own.

use std::sync::Arc;
use std::time::Duration;

use snapd_core::Clock;
use snapd_engine::{distinct_tree_idents, recycle_once, RecyclingOutcome, Service};
use tracing::{debug, info, warn};

/// Runs forever, sweeping every distinct `tree_ident` once per `interval`.
/// Each tree is recycled independently; one tree's error is logged and does
/// not stop the sweep over the rest.
pub async fn run<C: Clock + 'static>(service: Arc<Service<C>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        sweep_once(&service).await;
    }
}

async fn sweep_once<C: Clock>(service: &Service<C>) {
    let tree_idents = distinct_tree_idents(&service.store);
    debug!(tree_count = tree_idents.len(), "starting recycling sweep");
    for tree_ident in tree_idents {
        match recycle_once(service, tree_ident).await {
            Ok(RecyclingOutcome::Completed { work_count, all_successful }) => {
                info!(%tree_ident, work_count, all_successful, "recycling pass completed");
            }
            Ok(RecyclingOutcome::NothingToDo | RecyclingOutcome::EmptyTree) => {}
            Err(e) => warn!(%tree_ident, error = %e, "recycling pass failed"),
        }
    }
}

#[cfg(test)]
#[path = "recycling_tests.rs"]
mod tests;
