// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_are_32_char_lowercase_hex() {
    let id = StorageIdent::generate();
    assert_eq!(id.as_str().len(), HEX_ID_LEN);
    assert!(id
        .as_str()
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
}

#[test]
fn generated_ids_are_distinct() {
    assert_ne!(StorageIdent::generate(), StorageIdent::generate());
}

#[test]
fn from_str_checked_accepts_valid_hex() {
    let raw = "0123456789abcdef0123456789abcdef";
    let id = StorageIdent::from_str_checked(raw).expect("valid");
    assert_eq!(id.as_str(), raw);
}

#[test]
fn from_str_checked_rejects_wrong_length() {
    assert!(StorageIdent::from_str_checked("abc").is_err());
}

#[test]
fn from_str_checked_rejects_uppercase() {
    let raw = "0123456789ABCDEF0123456789abcdef";
    assert!(StorageIdent::from_str_checked(raw).is_err());
}

#[test]
fn display_matches_as_str() {
    let id = JournalToken::generate();
    assert_eq!(format!("{id}"), id.as_str());
}

#[test]
fn serde_round_trips() {
    let id = TreeIdent::generate();
    let json = serde_json::to_string(&id).expect("serialize");
    let back: TreeIdent = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(id, back);
}

#[test]
fn serde_rejects_invalid_hex() {
    let result: Result<StorageIdent, _> = serde_json::from_str("\"not-hex\"");
    assert!(result.is_err());
}

#[test]
fn short_fn_truncates() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}
