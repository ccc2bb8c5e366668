// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `get_raw_handle` (`spec.md` §4.9), grounded verbatim on
//! `service_logic/handle_operation.py`'s `get_raw_handle`.
//!
//! Deferred-open for a reader handle: if `open_snapshot` was called with
//! `open_raw_handle=false`, the first `get_raw_handle` call actually opens
//! the underlying raw handle against the image service.

use std::sync::Arc;

use snapd_core::{Clock, CoreResult};

use crate::handle_pool::Handle;
use crate::service::Service;

/// Returns `handle`'s record, opening its raw handle now if it is a reader
/// that hasn't been opened yet.
pub async fn get_raw_handle<C: Clock>(service: &Service<C>, handle: &str) -> CoreResult<Arc<Handle>> {
    let record = service.handle_pool.get(handle)?;

    if !record.writing && record.raw_handle() == 0 {
        let paths: Vec<String> =
            record.with_chain(|c| c.key_items().iter().map(|i| i.image_path.clone()).collect()).unwrap_or_default();
        let (raw_handle, endpoint) = service.image_service.open(&paths, &record.raw_flag).await?;
        record.set_raw(raw_handle, endpoint);
    }

    Ok(record)
}

#[cfg(test)]
#[path = "get_raw_handle_tests.rs"]
mod tests;
