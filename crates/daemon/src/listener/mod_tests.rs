// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use snapd_adapters::FakeImageService;
use snapd_core::FakeClock;
use snapd_storage::Store;
use snapd_wire::{read_message, write_message};
use tokio::net::UnixStream;

fn new_service() -> Arc<Service<FakeClock>> {
    Arc::new(Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new()))
}

#[tokio::test]
async fn close_unknown_handle_round_trips_a_not_found_error() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("snapd.sock");
    let listener = Listener::bind(&socket_path, new_service(), Duration::from_secs(1)).unwrap();
    tokio::spawn(listener.run());

    let mut client = loop {
        if let Ok(stream) = UnixStream::connect(&socket_path).await {
            break stream;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    let timeout = Duration::from_secs(1);
    write_message(&mut client, &Request::CloseSnapshot { handle: "missing".into() }, timeout).await.unwrap();
    let response: Response = read_message(&mut client, timeout).await.unwrap();

    match response {
        Response::Error { code, .. } => assert_eq!(code, snapd_core::code::NOT_FOUND),
        other => panic!("expected Error, got {other:?}"),
    }
}
