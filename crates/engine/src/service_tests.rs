// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use snapd_adapters::FakeImageService;
use snapd_core::FakeClock;

#[test]
fn trace_seq_is_monotonic_and_unique() {
    let service = Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new());
    let a = service.next_trace_seq();
    let b = service.next_trace_seq();
    assert!(b > a);
}

#[test]
fn default_mount_checker_never_reports_unmounted() {
    let service = Service::new(Store::in_memory(), Arc::new(FakeImageService::new()), FakeClock::new());
    assert!(!service.mount_checker.is_not_mounted("/anywhere"));
}
