//! # dockwire-protocol
//!
//! Wire-level decoding for engine response bodies.
//!
//! - [`FrameCodec`]: the 8-byte-header stdout/stderr framing used by
//!   non-TTY logs, attach and exec streams.
//! - [`OutputCodec`]: picks framed or pass-through decoding from the TTY
//!   setting and yields [`LogOutput`] chunks.
//! - [`JsonLinesCodec`]: newline-delimited JSON documents (events, pull and
//!   build progress, stats).
//! - [`DetachKeys`] / [`DetachFilter`]: client-side detach sequence handling
//!   for interactive sessions.
//! - [`Event`] and [`ProgressEvent`]: typed engine documents.
//!
//! ## Frame format
//!
//! ```text
//! ┌────────┬──────────────┬──────────────────┬──────────────┐
//! │ stream │ reserved (3) │ length (u32, BE) │ payload ...  │
//! │ 1 byte │   ignored    │     4 bytes      │ length bytes │
//! └────────┴──────────────┴──────────────────┴──────────────┘
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod detach;
pub mod event;
pub mod frame;
pub mod ndjson;
pub mod output;
pub mod progress;

pub use detach::{DetachFilter, DetachKeys, Filtered};
pub use event::{Actor, Event};
pub use frame::{Frame, FrameCodec};
pub use ndjson::JsonLinesCodec;
pub use output::{demux, resolve_tty, LogOutput, OutputCodec};
pub use progress::{ErrorDetail, ProgressDetail, ProgressEvent};
