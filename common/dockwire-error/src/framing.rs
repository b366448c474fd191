//! Errors raised while demultiplexing stdout/stderr frames.

use thiserror::Error;

/// A malformed or truncated frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The stream ended partway through a frame header.
    #[error("stream ended inside a frame header ({read} of 8 bytes)")]
    TruncatedHeader { read: usize },

    /// The stream ended before the declared payload was read.
    #[error("stream ended inside a frame payload ({read} of {expected} bytes)")]
    TruncatedPayload { expected: u32, read: usize },

    /// The header named a stream other than stdin, stdout or stderr.
    #[error("unknown stream selector {0}")]
    UnknownStream(u8),
}
