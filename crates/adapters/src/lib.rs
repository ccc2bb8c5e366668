// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! snapd-adapters: the external image-service contract and an in-memory
//! fake implementation for tests.

pub mod image_service;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use image_service::{Endpoint, ImageService, RawHandle};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeImageService;
