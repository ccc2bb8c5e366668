// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A real [`ImageService`] that talks to the external image-control-engine
//! process over plain HTTP/TCP — `spec.md` §1's "the underlying image
//! service that actually creates/opens/closes/merges/deletes image files"
//! out-of-scope collaborator.
//!
//! Grounded on the teacher's hand-rolled HTTP-over-TCP client
//! (`agent/docker/http.rs`'s `post_authed`/`send_request`): a raw request
//! line plus headers, no HTTP client dependency.

use std::time::Duration;

use async_trait::async_trait;
use snapd_adapters::{Endpoint, ImageService, RawHandle};
use snapd_core::{CoreError, CoreResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::IceEndpoints;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes each call to one of the three configured image-control-engine
/// endpoints (`spec.md` §6's "endpoint proxy strings for the two
/// image-service variants (read, write) and the CDP writer").
pub struct HttpImageService {
    endpoints: IceEndpoints,
}

impl HttpImageService {
    pub fn new(endpoints: IceEndpoints) -> Self {
        Self { endpoints }
    }

    fn endpoint_for(&self, target: &str, flag: &str) -> &str {
        if target.ends_with(".cdp") {
            &self.endpoints.cdp_write
        } else if flag.contains('w') {
            &self.endpoints.qcow_write
        } else {
            &self.endpoints.qcow_read
        }
    }

    async fn post(&self, endpoint: &str, path: &str, body: &serde_json::Value) -> CoreResult<serde_json::Value> {
        let body = serde_json::to_string(body).map_err(|e| CoreError::external(format!("encoding request: {e}")))?;
        let request = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let raw = tokio::time::timeout(REQUEST_TIMEOUT, send_request(endpoint, &request))
            .await
            .map_err(|_| CoreError::external(format!("request to {endpoint}{path} timed out")))??;
        serde_json::from_str(&raw).map_err(|e| CoreError::external(format!("decoding response from {endpoint}{path}: {e}")))
    }
}

async fn send_request(endpoint: &str, request: &str) -> CoreResult<String> {
    let mut stream = TcpStream::connect(endpoint)
        .await
        .map_err(|e| CoreError::external(format!("connecting to {endpoint}: {e}")))?;
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| CoreError::external(format!("writing to {endpoint}: {e}")))?;

    let mut reader = BufReader::new(&mut stream);
    read_http_body(&mut reader).await
}

async fn read_http_body<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> CoreResult<String> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).await.map_err(|e| CoreError::external(format!("reading response: {e}")))?;
    let text = String::from_utf8_lossy(&raw);
    let body = text.split("\r\n\r\n").nth(1).unwrap_or("");
    Ok(body.to_string())
}

fn parse_raw_handle(value: &serde_json::Value) -> CoreResult<RawHandle> {
    value
        .get("raw_handle")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| CoreError::external("image-service response missing raw_handle"))
}

fn parse_endpoint(value: &serde_json::Value) -> CoreResult<Endpoint> {
    value
        .get("endpoint")
        .and_then(serde_json::Value::as_str)
        .map(|s| Endpoint(s.to_string()))
        .ok_or_else(|| CoreError::external("image-service response missing endpoint"))
}

#[async_trait]
impl ImageService for HttpImageService {
    async fn create(
        &self,
        target: &str,
        parents: &[String],
        disk_bytes: u64,
        flag: &str,
    ) -> CoreResult<(RawHandle, Endpoint)> {
        let endpoint = self.endpoint_for(target, flag).to_string();
        let body = serde_json::json!({"target": target, "parents": parents, "disk_bytes": disk_bytes, "flag": flag});
        let response = self.post(&endpoint, "/create", &body).await?;
        Ok((parse_raw_handle(&response)?, parse_endpoint(&response)?))
    }

    async fn open(&self, chain: &[String], flag: &str) -> CoreResult<(RawHandle, Endpoint)> {
        let target = chain.last().map(String::as_str).unwrap_or("");
        let endpoint = self.endpoint_for(target, flag).to_string();
        let body = serde_json::json!({"chain": chain, "flag": flag});
        let response = self.post(&endpoint, "/open", &body).await?;
        Ok((parse_raw_handle(&response)?, parse_endpoint(&response)?))
    }

    async fn close(&self, raw_handle: RawHandle, endpoint: &Endpoint, sync: bool) -> CoreResult<()> {
        let body = serde_json::json!({"raw_handle": raw_handle, "sync": sync});
        self.post(&endpoint.0, "/close", &body).await.map(|_| ())
    }

    async fn del_snaport(&self, image_ident: &str) -> CoreResult<()> {
        let endpoint = self.endpoint_for(image_ident, "w").to_string();
        let body = serde_json::json!({"image_ident": image_ident});
        self.post(&endpoint, "/del_snaport", &body).await.map(|_| ())
    }

    async fn move_data_from_qcow(
        &self,
        merge_storage: &str,
        write_chain: &[String],
        flag: &str,
        hash_version: u32,
    ) -> CoreResult<()> {
        let body = serde_json::json!({
            "merge_storage": merge_storage,
            "write_chain": write_chain,
            "flag": flag,
            "hash_version": hash_version,
        });
        self.post(&self.endpoints.qcow_write, "/move_data_from_qcow", &body).await.map(|_| ())
    }

    async fn merge_cdp_to_qcow(&self, cdp_segments: &[String], base: &str, flag: &str) -> CoreResult<()> {
        let body = serde_json::json!({"cdp_segments": cdp_segments, "base": base, "flag": flag});
        self.post(&self.endpoints.cdp_write, "/merge_cdp_to_qcow", &body).await.map(|_| ())
    }

    async fn merge_qcow_hash(&self, target: &str, hash_version: u32) -> CoreResult<()> {
        let body = serde_json::json!({"target": target, "hash_version": hash_version});
        self.post(&self.endpoints.qcow_write, "/merge_qcow_hash", &body).await.map(|_| ())
    }

    async fn remove_cdp_file(&self, path: &str) -> CoreResult<()> {
        let body = serde_json::json!({"path": path});
        self.post(&self.endpoints.cdp_write, "/remove_cdp_file", &body).await.map(|_| ())
    }

    async fn remove_qcow_file(&self, path: &str) -> CoreResult<()> {
        let body = serde_json::json!({"path": path});
        self.post(&self.endpoints.qcow_write, "/remove_qcow_file", &body).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "image_service_client_tests.rs"]
mod tests;
