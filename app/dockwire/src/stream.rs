//! Typed views over streaming response bodies.

use dockwire_error::Result;
use dockwire_protocol::{demux, resolve_tty, JsonLinesCodec, LogOutput, ProgressEvent};
use dockwire_transport::{Outcome, ResponseStream};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::codec::FramedRead;

/// Container output: logs, non-interactive attach, exec output.
pub struct LogStream {
    inner: BoxStream<'static, Result<LogOutput>>,
    tty: bool,
}

impl LogStream {
    /// Decodes a raw response body.
    ///
    /// `tty` is the caller's hint; the engine's content type wins when it
    /// names the stream format.
    #[must_use]
    pub fn new(stream: ResponseStream, tty: bool) -> Self {
        let tty = resolve_tty(stream.content_type(), tty);
        Self {
            inner: demux(stream.into_reader(), tty).boxed(),
            tty,
        }
    }

    pub(crate) fn from_outcome(outcome: Outcome, tty: bool) -> Result<Self> {
        Ok(Self::new(outcome.into_stream()?, tty))
    }

    /// Whether the stream is passed through unframed.
    #[must_use]
    pub const fn is_tty(&self) -> bool {
        self.tty
    }
}

impl Stream for LogStream {
    type Item = Result<LogOutput>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("tty", &self.tty)
            .finish_non_exhaustive()
    }
}

/// A stream of JSON documents (stats, progress).
pub struct JsonStream<T> {
    inner: BoxStream<'static, Result<T>>,
}

impl<T: DeserializeOwned + Send + 'static> JsonStream<T> {
    #[must_use]
    pub fn new(stream: ResponseStream) -> Self {
        Self {
            inner: FramedRead::new(stream.into_reader(), JsonLinesCodec::<T>::new()).boxed(),
        }
    }

    pub(crate) fn from_outcome(outcome: Outcome) -> Result<Self> {
        Ok(Self::new(outcome.into_stream()?))
    }
}

impl<T> Stream for JsonStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for JsonStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonStream")
    }
}

/// Pull, push, build, load and import progress.
pub type ProgressStream = JsonStream<ProgressEvent>;

/// Drains a progress stream.
///
/// Returns every document, or the first in-band error as an engine error.
///
/// # Errors
///
/// Returns transport and decoding errors, and the first error document.
pub async fn follow_progress(mut stream: ProgressStream) -> Result<Vec<ProgressEvent>> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event?.into_result()?);
    }
    Ok(events)
}
