// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! snapd: the disk-snapshot storage daemon. Loads its TOML config, opens
//! the write-ahead log, binds the RPC listener, and runs a background
//! recycling sweep alongside it.

mod adapters;
mod config;
mod destroy_sweep;
mod dispatch;
mod listener;
mod logging;
mod recycling;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use adapters::image_service_client::HttpImageService;
use config::Config;
use snapd_core::SystemClock;
use snapd_engine::Service;
use snapd_storage::Store;
use tracing::{error, info};

fn main() -> ExitCode {
    let config_path = match parse_args() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("loading config {config_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(&config.state_dir.join("log")) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("initializing logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "building tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon exited with error");
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<PathBuf, String> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err("usage: snapd <config.toml>".to_string()),
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(state_dir = %config.state_dir.display(), socket_path = %config.socket_path.display(), "starting snapd");

    let store = Store::open(&config.state_dir)?;
    let image_service = Arc::new(HttpImageService::new(config.ice.clone()));
    let service = Arc::new(Service::new(store, image_service, SystemClock));

    let recycling_handle =
        tokio::spawn(recycling::run(Arc::clone(&service), std::time::Duration::from_secs(config.recycling_interval_secs)));
    let destroy_sweep_handle = tokio::spawn(destroy_sweep::run(
        Arc::clone(&service),
        std::time::Duration::from_secs(config.destroy_sweep_interval_secs),
    ));

    let listener = listener::Listener::bind(&config.socket_path, Arc::clone(&service), config.ipc_timeout())?;
    info!(socket_path = %config.socket_path.display(), "listening");
    listener.run().await;

    recycling_handle.abort();
    destroy_sweep_handle.abort();
    Ok(())
}
