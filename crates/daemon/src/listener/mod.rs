// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O (`spec.md` §1's "RPC transport...
//! thin glue").
//!
//! Grounded on the teacher's `listener::Listener`/`handle_connection`
//! pattern: accept in a loop, spawn one task per connection, read one
//! length-prefixed request, dispatch it, write one length-prefixed
//! response. Unlike the teacher's daemon this protocol is strictly
//! request/response — no TCP, auth handshake, or connection-upgrading
//! attach flow, since `spec.md` §6 names no such calls.

use std::sync::Arc;

use snapd_core::Clock;
use snapd_engine::Service;
use snapd_wire::{read_message, write_message, ProtocolError, Request, Response};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::dispatch;

/// Accepts connections on a Unix-domain socket and dispatches each request
/// it reads against `service`.
pub struct Listener<C: Clock> {
    socket: UnixListener,
    service: Arc<Service<C>>,
    ipc_timeout: std::time::Duration,
}

impl<C: Clock + 'static> Listener<C> {
    pub fn bind(path: &std::path::Path, service: Arc<Service<C>>, ipc_timeout: std::time::Duration) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let socket = UnixListener::bind(path)?;
        Ok(Self { socket, service, ipc_timeout })
    }

    /// Runs the accept loop until the process is signalled to stop. Never
    /// returns `Err` for a single connection's failure — only a listener
    /// bind/accept failure can end the loop.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let service = Arc::clone(&self.service);
                    let timeout = self.ipc_timeout;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &service, timeout).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timed out"),
        other => error!(error = %other, "connection error"),
    }
}

async fn handle_connection<C: Clock>(
    mut stream: UnixStream,
    service: &Service<C>,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.split();
    let request: Request = read_message(&mut reader, timeout).await?;
    info!(call = request.call_name(), "received request");

    let response: Response = dispatch::handle(service, request).await;
    debug!(response = ?response, "sending response");
    write_message(&mut writer, &response, timeout).await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
