// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use snapd_adapters::FakeImageService;
use snapd_core::FakeClock;
use std::sync::Arc;

fn new_service() -> Service<FakeClock> {
    Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new())
}

#[test]
fn set_hash_mode_records_value_on_handle() {
    let service = new_service();
    let record = service.handle_pool.insert("h1", true, "trace".to_string(), service.now()).unwrap();
    assert_eq!(record.hash_mode(), None);

    set_hash_mode(&service, "h1", 2).unwrap();

    assert_eq!(record.hash_mode(), Some(2));
}

#[test]
fn set_hash_mode_unknown_handle_fails_not_found() {
    let service = new_service();
    let err = set_hash_mode(&service, "missing", 1).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::NOT_FOUND);
}
