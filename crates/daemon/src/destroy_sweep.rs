// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background DESTROY-journal sweep (`spec.md` §4.7/§4.9's "actually
//! retiring nodes is driven by a periodic scan calling `destroy_snapshots`")
//! — a caller's `generate_journal_for_destroy` only records intent; this
//! loop is what consumes that journal and flips targeted rows
//! `Storage -> Recycling` so the recycling planner can ever see them.
//! Grounded on the same `tokio::time::interval` convention as
//! `daemon::recycling`'s planner sweep, since the core crate has no
//! scheduler of its own for either loop.

use std::sync::Arc;
use std::time::Duration;

use snapd_core::Clock;
use snapd_engine::{destroy_snapshots, DestroyOutcome, Service};
use tracing::{debug, info, warn};

/// Runs forever, processing every unconsumed DESTROY journal once per
/// `interval`. One journal's error is logged and does not stop the sweep
/// over the rest.
pub async fn run<C: Clock + 'static>(service: Arc<Service<C>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        sweep_once(&service);
    }
}

fn sweep_once<C: Clock>(service: &Service<C>) {
    match destroy_snapshots(service) {
        Ok(outcomes) => {
            debug!(journal_count = outcomes.len(), "destroy sweep completed");
            for outcome in outcomes {
                match outcome {
                    DestroyOutcome::Consumed { token } => info!(%token, "destroy journal consumed"),
                    DestroyOutcome::Deferred { token } => debug!(%token, "destroy journal deferred to next sweep"),
                }
            }
        }
        Err(e) => warn!(error = %e, "destroy sweep failed"),
    }
}

#[cfg(test)]
#[path = "destroy_sweep_tests.rs"]
mod tests;
