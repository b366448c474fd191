//! TTY-aware output decoding.

use crate::frame::FrameCodec;
use bytes::{Bytes, BytesMut};
use dockwire_constants::media::{MULTIPLEXED_STREAM, RAW_STREAM};
use dockwire_constants::wire::StreamSelector;
use dockwire_error::{Error, Result};
use std::fmt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

/// A chunk of container output.
///
/// Stdin frames are never surfaced; the decoder consumes and drops them.
#[derive(Clone, PartialEq, Eq)]
pub enum LogOutput {
    StdOut(Bytes),
    StdErr(Bytes),
    /// Unframed TTY output.
    Console(Bytes),
}

impl LogOutput {
    #[must_use]
    pub const fn as_bytes(&self) -> &Bytes {
        match self {
            Self::StdOut(b) | Self::StdErr(b) | Self::Console(b) => b,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::StdOut(b) | Self::StdErr(b) | Self::Console(b) => b,
        }
    }

    /// Returns the frame selector, or `None` for TTY output.
    #[must_use]
    pub const fn selector(&self) -> Option<StreamSelector> {
        match self {
            Self::StdOut(_) => Some(StreamSelector::Stdout),
            Self::StdErr(_) => Some(StreamSelector::Stderr),
            Self::Console(_) => None,
        }
    }
}

impl fmt::Debug for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StdOut(_) => "StdOut",
            Self::StdErr(_) => "StdErr",
            Self::Console(_) => "Console",
        };
        f.debug_tuple(name)
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Decodes a container output stream.
///
/// With a TTY the engine does not frame output and bytes pass through as
/// [`LogOutput::Console`]. Without one every frame becomes a tagged chunk.
#[derive(Debug, Clone, Copy)]
pub struct OutputCodec {
    framing: Option<FrameCodec>,
}

impl OutputCodec {
    #[must_use]
    pub const fn new(tty: bool) -> Self {
        Self {
            framing: if tty { None } else { Some(FrameCodec::new()) },
        }
    }

    #[must_use]
    pub const fn is_tty(&self) -> bool {
        self.framing.is_none()
    }
}

impl Decoder for OutputCodec {
    type Item = LogOutput;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogOutput>> {
        match &mut self.framing {
            None if src.is_empty() => Ok(None),
            None => Ok(Some(LogOutput::Console(src.split().freeze()))),
            Some(codec) => {
                while let Some(frame) = codec.decode(src)? {
                    if let Some(chunk) = tag(frame) {
                        return Ok(Some(chunk));
                    }
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogOutput>> {
        if let Some(codec) = &mut self.framing {
            while let Some(frame) = codec.decode_eof(src)? {
                if let Some(chunk) = tag(frame) {
                    return Ok(Some(chunk));
                }
            }
            return Ok(None);
        }
        self.decode(src)
    }
}

fn tag(frame: crate::Frame) -> Option<LogOutput> {
    match frame.stream {
        StreamSelector::Stdin => None,
        StreamSelector::Stdout => Some(LogOutput::StdOut(frame.payload)),
        StreamSelector::Stderr => Some(LogOutput::StdErr(frame.payload)),
    }
}

/// Decides whether a stream is unframed.
///
/// The engine's content-type label wins over the caller's TTY flag.
#[must_use]
pub fn resolve_tty(content_type: Option<&str>, tty: bool) -> bool {
    match content_type {
        Some(ct) if ct.starts_with(MULTIPLEXED_STREAM) => false,
        Some(ct) if ct.starts_with(RAW_STREAM) => true,
        _ => tty,
    }
}

/// Wraps a reader in the output decoder.
pub fn demux<R: AsyncRead>(reader: R, tty: bool) -> FramedRead<R, OutputCodec> {
    FramedRead::new(reader, OutputCodec::new(tty))
}
