//! # dockwire-transport
//!
//! Executes engine API requests over a single connection strategy.
//!
//! - [`ConnectionDescriptor`]: where the engine lives (Unix socket, or TCP
//!   with optional TLS material). Immutable once a client is built.
//! - [`RequestDescriptor`]: one fully-resolved call (method, path, query,
//!   body, response mode).
//! - [`Transport`]: executes a descriptor and yields an [`Outcome`].
//! - [`HttpTransport`]: the hyper HTTP/1.1 implementation, one connection per
//!   call, kept open for streaming bodies and upgraded sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 dockwire-transport                   │
//! │                                                      │
//! │  RequestDescriptor ──► HttpTransport ──► Connector   │
//! │                             │              │         │
//! │                             │       ┌──────┴──────┐  │
//! │                             │       │ Unix │ TCP  │  │
//! │                             │       │      │ +TLS │  │
//! │                             ▼       └─────────────┘  │
//! │     Outcome::{Json, Stream, Upgraded}                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The transport never retries. Every failure is surfaced with enough
//! structure (see [`dockwire_error::Error`]) for the caller to decide.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod connector;
pub mod descriptor;
pub mod http;
pub mod outcome;
pub mod request;
mod tls;

pub use connector::{Connection, Connector};
pub use descriptor::{ConnectionDescriptor, Protocol, TlsMaterial};
pub use dockwire_error::{Error, Result, TransportError};
pub use http::HttpTransport;
pub use hyper::Method;
pub use outcome::{ByteStream, Outcome, ResponseStream, UpgradedConnection, UpgradedIo};
pub use request::{BodyStream, RequestBody, RequestDescriptor, ResponseMode};

use async_trait::async_trait;

/// Executes request descriptors against the engine.
///
/// Implementations must be shareable across concurrent calls; each call is
/// independent and shares nothing but the connection strategy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when no response was received and
    /// [`Error::Engine`] for non-2xx responses.
    async fn execute(&self, request: RequestDescriptor) -> Result<Outcome>;
}
