// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message framing: a 4-byte big-endian length prefix followed by a JSON
//! payload, read/written with a caller-supplied timeout. Grounded on the
//! teacher's `listener::handle_connection` pattern of racing I/O against a
//! timeout rather than leaving a connection to block forever.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum payload size accepted by [`read_message`] — guards against a
/// corrupt or hostile length prefix forcing an unbounded allocation.
pub const MAX_MESSAGE_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for message")]
    Timeout,

    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_BYTES}-byte limit")]
    MessageTooLarge(u32),
}

/// Reads one length-prefixed JSON message, failing with
/// [`ProtocolError::Timeout`] if nothing arrives within `timeout`.
pub async fn read_message<T, R>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, read_message_inner(reader)).await.map_err(|_| ProtocolError::Timeout)?
}

async fn read_message_inner<T, R>(reader: &mut R) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::MessageTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Writes one length-prefixed JSON message, failing with
/// [`ProtocolError::Timeout`] if the write doesn't complete within `timeout`.
pub async fn write_message<T, W>(writer: &mut W, value: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    T: Serialize + Sync,
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, write_message_inner(writer, value)).await.map_err(|_| ProtocolError::Timeout)?
}

async fn write_message_inner<T, W>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(value)?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| ProtocolError::MessageTooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
