// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::{read_message, write_message, ProtocolError, Request, Response};

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = Response::Handle { raw_handle: 7, ice_endpoint: "fake://x".into() };

    let mut buffer = Vec::new();
    write_message(&mut buffer, &original, TIMEOUT).await.expect("write failed");
    assert_eq!(buffer.len(), 4 + buffer[4..].len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back: Response = read_message(&mut cursor, TIMEOUT).await.expect("read failed");
    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_big_endian_length_prefix() {
    let request = Request::CloseSnapshot { handle: "h1".into() };

    let mut buffer = Vec::new();
    write_message(&mut buffer, &request, TIMEOUT).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, buffer.len() - 4);
}

#[tokio::test]
async fn read_message_on_empty_stream_reports_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let err = read_message::<Response, _>(&mut cursor, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn read_message_rejects_oversized_length_prefix() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(crate::framing::MAX_MESSAGE_BYTES + 1).to_be_bytes());
    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message::<Response, _>(&mut cursor, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge(_)));
}
