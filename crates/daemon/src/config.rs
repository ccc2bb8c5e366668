// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide configuration (`spec.md` §6: "Endpoint proxy strings for
//! the two image-service variants (read, write) and the CDP writer.
//! Thread-pool sizing. All other configuration is out of scope.").
//!
//! Loaded from a TOML file, grounded on the teacher's `toml`-based config
//! convention (no single surviving teacher `config.rs` was retrieved to
//! copy verbatim).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use snapd_core::CoreError;

/// Round-trippable endpoint proxy strings for the external image service's
/// three variants (`spec.md` §6's "two image-service variants (read,
/// write) and the CDP writer").
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct IceEndpoints {
    pub qcow_read: String,
    pub qcow_write: String,
    pub cdp_write: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the write-ahead log and periodic checkpoints
    /// (`snapd_storage::Store::open`).
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Unix-domain socket the listener binds.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    pub ice: IceEndpoints,

    /// Worker threads for the Tokio runtime (`spec.md` §6 thread-pool
    /// sizing).
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Seconds between recycling passes over each live `tree_ident`
    /// (`spec.md` §1's "background recycling loop").
    #[serde(default = "default_recycling_interval_secs")]
    pub recycling_interval_secs: u64,

    /// Seconds between scans of unconsumed DESTROY journals (`spec.md`
    /// §4.7/§4.9's "actually retiring nodes is driven by a periodic scan
    /// calling `destroy_snapshots`").
    #[serde(default = "default_destroy_sweep_interval_secs")]
    pub destroy_sweep_interval_secs: u64,

    /// Per-request read/write timeout on the listener socket.
    #[serde(default = "default_ipc_timeout_ms")]
    pub ipc_timeout_ms: u64,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/snapd")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/snapd.sock")
}

fn default_worker_threads() -> usize {
    4
}

fn default_recycling_interval_secs() -> u64 {
    30
}

fn default_destroy_sweep_interval_secs() -> u64 {
    10
}

fn default_ipc_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn ipc_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ipc_timeout_ms)
    }
}

impl Config {
    /// Parses a TOML config file. `SNAPD_STATE_DIR`/`SNAPD_SOCKET_PATH`
    /// environment variables, when set, override the file's values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::external(format!("reading config {path:?}: {e}")))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| CoreError::Validation(format!("parsing config: {e}")))?;
        if let Ok(dir) = std::env::var("SNAPD_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("SNAPD_SOCKET_PATH") {
            config.socket_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
