//! Dump line format shared by the oracle and the comparison driver.
//!
//! ```text
//! hash=<8 hex digits> key=<raw key> value=<raw value>
//! ```
//!
//! The fingerprint is the CRC-32 (IEEE) of the key. It only has to be stable
//! and identical on both sides of a comparison: the driver re-fingerprints
//! engine output, so the engine may use any hash of its own.

use crc32fast::Hasher as Crc32;
use std::fmt;
use thiserror::Error;

/// Errors from [`DumpLine::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),

    #[error("bad fingerprint {0:?}")]
    BadFingerprint(String),
}

/// Stable hash of a key.
pub fn fingerprint(key: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(key);
    hasher.finalize()
}

/// One surviving key of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLine {
    pub fingerprint: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl DumpLine {
    /// Builds a line, computing the fingerprint from `key`.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            fingerprint: fingerprint(&key),
            key,
            value,
        }
    }

    /// Appends the canonical text (no terminator) to `out`.
    pub fn render(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(format!("hash={:08x} key=", self.fingerprint).as_bytes());
        out.extend_from_slice(&self.key);
        out.extend_from_slice(b" value=");
        out.extend_from_slice(&self.value);
    }

    /// Parses `hash=… key=… value=…`.
    ///
    /// Fields may appear in any order. `hash` is optional but must be hex when
    /// present; the fingerprint is always recomputed from the key, so an
    /// engine printing an MD5 digest parses the same as the oracle's own dump.
    pub fn parse(line: &[u8]) -> Result<Self, DumpError> {
        let mut key = None;
        let mut value = None;

        for token in line
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some(rest) = token.strip_prefix(b"key=") {
                key = Some(rest.to_vec());
            } else if let Some(rest) = token.strip_prefix(b"value=") {
                value = Some(rest.to_vec());
            } else if let Some(rest) = token.strip_prefix(b"hash=") {
                if rest.is_empty() || !rest.iter().all(|b| b.is_ascii_hexdigit()) {
                    return Err(DumpError::BadFingerprint(
                        String::from_utf8_lossy(rest).into_owned(),
                    ));
                }
            } else {
                return Err(DumpError::UnexpectedToken(
                    String::from_utf8_lossy(token).into_owned(),
                ));
            }
        }

        let key = key.ok_or(DumpError::MissingField("key"))?;
        let value = value.ok_or(DumpError::MissingField("value"))?;
        Ok(Self::new(key, value))
    }
}

impl fmt::Display for DumpLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.render(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}
