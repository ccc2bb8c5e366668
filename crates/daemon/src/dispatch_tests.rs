// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use snapd_adapters::FakeImageService;
use snapd_core::{FakeClock, Status, StorageIdent, StorageType};
use snapd_storage::Store;

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

#[tokio::test]
async fn root_qcow_create_flow_reports_a_writing_status_row() {
    let service = new_service();
    let token = JournalToken::generate();
    let ident = StorageIdent::generate();

    let create_journal = handle(
        &service,
        Request::GenerateJournalForCreate {
            journal_token: token.to_string(),
            new_ident: ident.to_string(),
            parent_ident: None,
            parent_timestamp: None,
            new_type: StorageType::Qcow,
            new_storage_folder: "/s".into(),
            new_disk_bytes: 4096,
            new_hash_version: None,
        },
    )
    .await;
    assert_eq!(create_journal, Response::Ok);

    let response = handle(
        &service,
        Request::CreateSnapshot {
            handle: "h1".into(),
            journal_token: token.to_string(),
            caller_trace: None,
            caller_pid: 1,
            caller_pid_created: 1,
        },
    )
    .await;
    assert!(matches!(response, Response::Handle { .. }));

    let row = service.store.storage_by_ident(ident).expect("row exists");
    assert_eq!(row.status, Status::Writing);
}

#[tokio::test]
async fn malformed_ident_surfaces_as_validation_error() {
    let service = new_service();
    let response = handle(
        &service,
        Request::GenerateJournalForCreate {
            journal_token: "not-32-hex".into(),
            new_ident: JournalToken::generate().to_string(),
            parent_ident: None,
            parent_timestamp: None,
            new_type: StorageType::Qcow,
            new_storage_folder: "/s".into(),
            new_disk_bytes: 4096,
            new_hash_version: None,
        },
    )
    .await;
    match response {
        Response::Error { code, .. } => assert_eq!(code, snapd_core::code::VALIDATION),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn close_unknown_handle_surfaces_not_found() {
    let service = new_service();
    let response = handle(&service, Request::CloseSnapshot { handle: "missing".into() }).await;
    match response {
        Response::Error { code, .. } => assert_eq!(code, snapd_core::code::NOT_FOUND),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_snapshot_with_oversized_handle_is_rejected_before_touching_the_pool() {
    let service = new_service();
    let token = JournalToken::generate();
    let response = handle(
        &service,
        Request::CreateSnapshot {
            handle: "x".repeat(33),
            journal_token: token.to_string(),
            caller_trace: None,
            caller_pid: 1,
            caller_pid_created: 1,
        },
    )
    .await;
    match response {
        Response::Error { code, .. } => assert_eq!(code, snapd_core::code::VALIDATION),
        other => panic!("expected Error, got {other:?}"),
    }
}
