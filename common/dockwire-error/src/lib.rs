//! Error types shared by every `dockwire` crate.
//!
//! The taxonomy separates failures by where they happen, so callers can pick
//! a retry policy without string matching:
//!
//! - [`TransportError`]: the connection itself failed (refused, reset,
//!   timeout). Never carries a status code.
//! - [`EngineError`]: the engine answered with a non-2xx status.
//! - [`Error::Conflict`]: an [`EngineError`] raised by a versioned update whose
//!   version token was stale.
//! - [`FramingError`]: a multiplexed stdout/stderr stream was malformed.
//! - [`Error::ProtocolState`]: an operation on a hijacked session that is
//!   already closed.
//!
//! # Usage
//!
//! ```rust
//! use dockwire_error::{EngineError, Error};
//!
//! let err = Error::engine(404, br#"{"message":"No such container: abc"}"#);
//! assert!(err.is_not_found());
//! assert_eq!(err.status_code(), Some(404));
//! # let _ = EngineError::from_body(500, b"");
//! ```

mod engine;
mod framing;
mod transport;

pub use engine::{EngineBody, EngineError};
pub use framing::FramingError;
pub use transport::TransportError;

use dockwire_constants::api::OUT_OF_SEQUENCE_MESSAGE;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for engine client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-2xx engine response.
    #[error(transparent)]
    Engine(EngineError),

    /// Stale version token on a versioned update.
    #[error("conflict: {0}")]
    Conflict(EngineError),

    /// Malformed multiplexed stream.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Operation on a closed hijacked session.
    #[error("no such session: {0}")]
    ProtocolState(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request could not be assembled from the supplied options.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds an engine error from a response status and body.
    #[must_use]
    pub fn engine(status: u16, body: &[u8]) -> Self {
        Self::Engine(EngineError::from_body(status, body))
    }

    /// Creates a new invalid request error.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new closed-session error.
    #[must_use]
    pub fn no_session(msg: impl Into<String>) -> Self {
        Self::ProtocolState(msg.into())
    }

    /// Reclassifies a stale-version engine error as [`Error::Conflict`].
    ///
    /// Applied only to versioned updates: a 409 or an "update out of sequence"
    /// message becomes a conflict. Everything else passes through untouched.
    #[must_use]
    pub fn into_version_conflict(self) -> Self {
        match self {
            Self::Engine(err)
                if err.status == 409 || err.message().contains(OUT_OF_SEQUENCE_MESSAGE) =>
            {
                Self::Conflict(err)
            }
            other => other,
        }
    }

    /// Returns the engine status code, if the engine answered.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Engine(err) | Self::Conflict(err) => Some(err.status),
            _ => None,
        }
    }

    /// Returns true if the engine reported a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status_code(), Some(404))
    }

    /// Returns true if this is a version conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if the connection failed before the engine answered.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::from(err))
    }
}
