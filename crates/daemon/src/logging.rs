// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging bootstrap: `tracing-subscriber` with an `EnvFilter` plus a
//! daily-rotated file appender, matching the teacher's
//! `tracing-subscriber`/`tracing-appender` daemon convention (no single
//! surviving `logging.rs` was retrieved to copy verbatim, per `DESIGN.md`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. The returned [`WorkerGuard`] must be held
/// for the process lifetime — dropping it stops the background flush task,
/// silently truncating the tail of the log.
pub fn init(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "snapd.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("SNAPD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(guard)
}
