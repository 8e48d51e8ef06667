//! Primitive types: digests, principals and timestamps

use crate::error::{Error, Result};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A SHA-256 digest, as committed to by hash trees and certified data
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

// Custom serde implementation for Digest - serialize as hex for readability
impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

impl Digest {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != Self::LEN {
            return Err(Error::InvalidDigestLength {
                expected: Self::LEN,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The identity of a canister or user.
///
/// Principals are opaque byte strings of at most 29 bytes. Their textual form
/// is the lowercase base32 encoding of `crc32(bytes) || bytes`, split into
/// groups of five characters separated by dashes (e.g. `aaaaa-aa`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    pub const MAX_LEN: usize = 29;

    /// The management canister, whose id is the empty byte string.
    pub fn management_canister() -> Self {
        Self(Vec::new())
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() > Self::MAX_LEN {
            return Err(Error::InvalidPrincipal(format!(
                "length {} exceeds maximum of {} bytes",
                slice.len(),
                Self::MAX_LEN
            )));
        }
        Ok(Self(slice.to_vec()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::with_capacity(4 + self.0.len());
        buf.extend_from_slice(&crc32fast::hash(&self.0).to_be_bytes());
        buf.extend_from_slice(&self.0);
        let encoded = BASE32_NOPAD.encode(&buf).to_ascii_lowercase();

        let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let compact: String = text
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();

        let bytes = BASE32_NOPAD
            .decode(compact.as_bytes())
            .map_err(|e| Error::InvalidPrincipal(format!("bad base32: {}", e)))?;

        if bytes.len() < 4 {
            return Err(Error::InvalidPrincipal("missing checksum".to_string()));
        }

        let (checksum, body) = bytes.split_at(4);
        let principal = Self::from_slice(body)?;

        if checksum != crc32fast::hash(body).to_be_bytes() {
            return Err(Error::InvalidPrincipal("checksum mismatch".to_string()));
        }

        if principal.to_text() != text {
            return Err(Error::InvalidPrincipal(format!(
                "'{}' is not in canonical form",
                text
            )));
        }

        Ok(principal)
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// A timestamp with nanosecond precision
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since UNIX epoch
    pub seconds: i64,
    /// Nanoseconds (0-999,999,999)
    pub nanos: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos(),
        }
    }

    /// Build a timestamp from nanoseconds since the UNIX epoch, the unit
    /// certificates carry their time in.
    pub fn from_unix_nanos(nanos: u64) -> Self {
        Self {
            seconds: (nanos / 1_000_000_000) as i64,
            nanos: (nanos % 1_000_000_000) as u32,
        }
    }

    /// Milliseconds since the UNIX epoch, truncated
    pub fn as_millis(&self) -> i64 {
        self.seconds * 1000 + (self.nanos / 1_000_000) as i64
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}.{:09})", self.seconds, self.nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dt) = chrono::DateTime::from_timestamp(self.seconds, self.nanos) {
            write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.9f UTC"))
        } else {
            write!(f, "{}.{:09}", self.seconds, self.nanos)
        }
    }
}
