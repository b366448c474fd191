//! Detach key sequences.
//!
//! A sequence is a comma-separated list of keys, each either a single
//! character or `ctrl-<value>` where `<value>` is one of `a-z`, `@`, `[`,
//! `\`, `]`, `^` or `_`. The default is `ctrl-p,ctrl-q`.

use bytes::{Bytes, BytesMut};
use dockwire_constants::detach::DEFAULT_DETACH_KEYS;
use dockwire_error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed detach sequence.
#[derive(Clone, PartialEq, Eq)]
pub struct DetachKeys {
    spec: String,
    bytes: Vec<u8>,
}

impl DetachKeys {
    /// Parses a detach sequence. An empty string disables detaching.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for unknown keys.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Self::disabled());
        }

        let bytes = spec
            .split(',')
            .map(|key| parse_key(key.trim()))
            .collect::<Result<Vec<u8>>>()?;

        Ok(Self {
            spec: spec.to_string(),
            bytes,
        })
    }

    /// A sequence that never matches.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            spec: String::new(),
            bytes: Vec::new(),
        }
    }

    /// The sequence as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    /// The bytes that trigger a detach.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for DetachKeys {
    fn default() -> Self {
        Self {
            spec: DEFAULT_DETACH_KEYS.to_string(),
            bytes: vec![0x10, 0x11],
        }
    }
}

impl FromStr for DetachKeys {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for DetachKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetachKeys({:?})", self.spec)
    }
}

fn parse_key(key: &str) -> Result<u8> {
    let invalid = || Error::invalid_request(format!("invalid detach key: {key:?}"));

    let Some(value) = key.strip_prefix("ctrl-") else {
        return match key.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(invalid()),
        };
    };

    match value.as_bytes() {
        [c @ b'a'..=b'z'] => Ok(c - b'a' + 1),
        [c @ b'A'..=b'Z'] => Ok(c - b'A' + 1),
        [b'@'] => Ok(0),
        [b'['] => Ok(27),
        [b'\\'] => Ok(28),
        [b']'] => Ok(29),
        [b'^'] => Ok(30),
        [b'_'] => Ok(31),
        _ => Err(invalid()),
    }
}

/// Result of passing stdin bytes through a [`DetachFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filtered {
    /// Forward these bytes to the remote end.
    Forward(Bytes),
    /// The sequence was typed. Forward the bytes that preceded it, then close.
    Detach(Bytes),
}

/// Watches outgoing stdin for the detach sequence.
///
/// Bytes that could be the start of the sequence are held back until the
/// sequence either completes (they are dropped) or diverges (they are
/// released). Sequences split across writes are recognized.
#[derive(Debug, Clone)]
pub struct DetachFilter {
    keys: DetachKeys,
    pending: Vec<u8>,
}

impl DetachFilter {
    #[must_use]
    pub const fn new(keys: DetachKeys) -> Self {
        Self {
            keys,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub const fn keys(&self) -> &DetachKeys {
        &self.keys
    }

    /// Bytes currently held back as a possible sequence prefix.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Filters one write.
    pub fn feed(&mut self, data: &[u8]) -> Filtered {
        let sequence = self.keys.as_bytes();
        if sequence.is_empty() {
            return Filtered::Forward(Bytes::copy_from_slice(data));
        }

        let mut out = BytesMut::with_capacity(data.len());
        for &byte in data {
            self.pending.push(byte);
            while !sequence.starts_with(&self.pending) {
                out.extend_from_slice(&self.pending[..1]);
                self.pending.remove(0);
            }
            if self.pending.len() == sequence.len() {
                self.pending.clear();
                return Filtered::Detach(out.freeze());
            }
        }
        Filtered::Forward(out.freeze())
    }

    /// Releases held-back bytes, e.g. when stdin is closed.
    pub fn flush(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.pending))
    }
}
