// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn generate_journal_for_create_round_trips_through_json() {
    let request = Request::GenerateJournalForCreate {
        journal_token: "a".repeat(32),
        new_ident: "b".repeat(32),
        parent_ident: None,
        parent_timestamp: None,
        new_type: StorageType::Qcow,
        new_storage_folder: "/s".into(),
        new_disk_bytes: 1 << 30,
        new_hash_version: None,
    };
    let json = serde_json::to_string(&request).expect("serialize");
    assert!(json.contains("\"call\":\"generate_journal_for_create\""));
    let back: Request = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, request);
}

#[test]
fn create_snapshot_deserializes_without_optional_caller_trace() {
    let json = r#"{
        "call": "create_snapshot",
        "handle": "H1",
        "journal_token": "T1",
        "caller_pid": 1,
        "caller_pid_created": 0
    }"#;
    let request: Request = serde_json::from_str(json).expect("deserialize");
    match request {
        Request::CreateSnapshot { caller_trace, .. } => assert_eq!(caller_trace, None),
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[parameterized(
    generate_journal_for_create = {
        Request::GenerateJournalForCreate {
            journal_token: "t".into(),
            new_ident: "i".into(),
            parent_ident: None,
            parent_timestamp: None,
            new_type: StorageType::Qcow,
            new_storage_folder: "/s".into(),
            new_disk_bytes: 1,
            new_hash_version: None,
        },
        "generate_journal_for_create",
    },
    generate_journal_for_destroy = {
        Request::GenerateJournalForDestroy { journal_token: "t".into(), idents: vec!["i".into()] },
        "generate_journal_for_destroy",
    },
    create_snapshot = {
        Request::CreateSnapshot {
            handle: "h".into(),
            journal_token: "t".into(),
            caller_trace: None,
            caller_pid: 1,
            caller_pid_created: 0,
        },
        "create_snapshot",
    },
    open_snapshot = {
        Request::OpenSnapshot {
            handle: "h".into(),
            caller_trace: None,
            caller_pid: 1,
            caller_pid_created: 0,
            storage_ident: "i".into(),
            timestamp: None,
            open_raw_handle: false,
        },
        "open_snapshot",
    },
    close_snapshot = { Request::CloseSnapshot { handle: "h".into() }, "close_snapshot" },
    get_raw_handle = { Request::GetRawHandle { handle: "h".into() }, "get_raw_handle" },
    set_hash_mode = { Request::SetHashMode { handle: "h".into(), hash_mode: 1 }, "set_hash_mode" },
)]
fn call_name_matches_rpc_table_names(request: Request, expected: &str) {
    assert_eq!(request.call_name(), expected);
}
