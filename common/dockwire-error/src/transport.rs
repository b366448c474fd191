//! Connection-level failures.

use std::io;
use thiserror::Error;

/// Errors that occur before the engine produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Connection reset by the peer.
    #[error("connection reset")]
    ConnectionReset,

    /// Timeout.
    #[error("timeout")]
    Timeout,

    /// Invalid address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// TLS setup or handshake failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// HTTP protocol error on the connection.
    #[error("http error: {0}")]
    Http(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => {
                Self::ConnectionRefused(err.to_string())
            }
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                Self::ConnectionReset
            }
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}
