// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-width hex identifiers.
//!
//! Every ident and journal token in this system is exactly 32 lowercase hex
//! characters (a UUIDv4 with its dashes stripped). [`IdBuf`] is an inline,
//! `Copy` buffer sized for that format; [`define_hex_id!`] builds a newtype
//! around it with validation, generation, and serde support.

use crate::{CoreError, CoreResult};

/// Byte length of every ident/token in this system.
pub const HEX_ID_LEN: usize = 32;

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

fn is_lowercase_hex(s: &str) -> bool {
    s.len() == HEX_ID_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Validates that `s` is exactly [`HEX_ID_LEN`] lowercase hex characters.
pub fn validate_hex_id(s: &str) -> CoreResult<()> {
    if is_lowercase_hex(s) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "expected {HEX_ID_LEN}-char lowercase hex id, got {s:?}"
        )))
    }
}

/// Fixed-size inline hex-id buffer. Always exactly 32 ASCII bytes, `Copy`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdBuf {
    buf: [u8; HEX_ID_LEN],
}

impl std::hash::Hash for IdBuf {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl IdBuf {
    /// Generates a fresh random id (UUIDv4, hyphens stripped, lowercased).
    pub fn generate() -> Self {
        let s = uuid::Uuid::new_v4().simple().to_string();
        Self::new(&s)
    }

    /// Parses an existing hex string. Debug-asserts the format is valid;
    /// callers that accept untrusted input should use [`validate_hex_id`] first.
    pub fn new(s: &str) -> Self {
        debug_assert!(is_lowercase_hex(s), "invalid hex id: {s:?}");
        let mut buf = [b'0'; HEX_ID_LEN];
        let n = s.len().min(HEX_ID_LEN);
        buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        Self { buf }
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only ever constructed from ASCII hex bytes.
        match std::str::from_utf8(&self.buf) {
            Ok(s) => s,
            Err(_) => unreachable!("IdBuf constructed from non-UTF-8"),
        }
    }
}

impl std::borrow::Borrow<str> for IdBuf {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for IdBuf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IdBuf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        if !is_lowercase_hex(s) {
            return Err(serde::de::Error::custom(format!(
                "expected {HEX_ID_LEN}-char lowercase hex id, got {s:?}"
            )));
        }
        Ok(IdBuf::new(s))
    }
}

/// Define a newtype identifier wrapper around [`IdBuf`].
///
/// Generates `generate()`, `from_str_checked()` (validating), `as_str()`,
/// `Display`, `Borrow<str>`, `Deref`, and serde passthrough.
///
/// ```ignore
/// define_hex_id! {
///     /// A snapshot-storage node identifier.
///     pub struct StorageIdent;
/// }
/// ```
#[macro_export]
macro_rules! define_hex_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::id::IdBuf);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self($crate::id::IdBuf::generate())
            }

            /// Parses and validates an externally supplied identifier.
            pub fn from_str_checked(s: impl AsRef<str>) -> $crate::CoreResult<Self> {
                let s = s.as_ref();
                $crate::id::validate_hex_id(s)?;
                Ok(Self($crate::id::IdBuf::new(s)))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0.as_str())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.as_str())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

define_hex_id! {
    /// Identifier of a [`SnapshotStorage`](https://docs.rs/snapd-storage) node.
    pub struct StorageIdent;
}

define_hex_id! {
    /// Unique token of a journal (intent-log) entry.
    pub struct JournalToken;
}

define_hex_id! {
    /// Opaque tag grouping nodes that share a common root lineage.
    pub struct TreeIdent;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
