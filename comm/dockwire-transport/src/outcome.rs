//! Call outcomes.

use bytes::{Bytes, BytesMut};
use dockwire_error::{Error, Result};
use futures::{Stream, StreamExt};
use hyper::header::CONTENT_TYPE;
use hyper::HeaderMap;
use serde_json::Value;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::StreamReader;

/// Lazy sequence of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Duplex byte channel left behind by a protocol upgrade.
pub trait UpgradedIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> UpgradedIo for T {}

/// A streaming response body with its head.
pub struct ResponseStream {
    status: u16,
    headers: HeaderMap,
    body: ByteStream,
}

impl ResponseStream {
    /// Wraps a body stream.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Wraps an in-memory body, split into the given chunks.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let body = futures::stream::iter(chunks.into_iter().map(Ok)).boxed();
        Self::new(200, HeaderMap::new(), body)
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// Returns the body stream.
    #[must_use]
    pub fn into_body(self) -> ByteStream {
        self.body
    }

    /// Adapts the body into an [`AsyncRead`] for codec-based decoding.
    #[must_use]
    pub fn into_reader(self) -> StreamReader<ByteStream, Bytes> {
        StreamReader::new(self.body)
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection fails mid-body.
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ResponseStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.body.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("status", &self.status)
            .field("content_type", &self.content_type())
            .finish_non_exhaustive()
    }
}

/// Connection after `101 Switching Protocols`.
pub struct UpgradedConnection {
    headers: HeaderMap,
    io: Box<dyn UpgradedIo>,
}

impl UpgradedConnection {
    #[must_use]
    pub fn new(headers: HeaderMap, io: Box<dyn UpgradedIo>) -> Self {
        Self { headers, io }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the raw duplex channel.
    #[must_use]
    pub fn into_io(self) -> Box<dyn UpgradedIo> {
        self.io
    }
}

impl fmt::Debug for UpgradedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradedConnection")
            .field("content_type", &self.content_type())
            .finish_non_exhaustive()
    }
}

/// Result of executing a request, shaped by its response mode.
#[derive(Debug)]
pub enum Outcome {
    Json(Value),
    Stream(ResponseStream),
    Upgraded(UpgradedConnection),
}

impl Outcome {
    /// Returns the parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the call was not buffered.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            other => Err(mismatch("json", &other)),
        }
    }

    /// Returns the body stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the call was not streamed.
    pub fn into_stream(self) -> Result<ResponseStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            other => Err(mismatch("stream", &other)),
        }
    }

    /// Returns the upgraded connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the call was not upgraded.
    pub fn into_upgraded(self) -> Result<UpgradedConnection> {
        match self {
            Self::Upgraded(conn) => Ok(conn),
            other => Err(mismatch("upgraded", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Outcome) -> Error {
    let got = match got {
        Outcome::Json(_) => "json",
        Outcome::Stream(_) => "stream",
        Outcome::Upgraded(_) => "upgraded",
    };
    Error::invalid_request(format!("expected a {expected} outcome, got {got}"))
}

/// Parses a buffered body.
///
/// Empty bodies are `null`; bodies that are not JSON become a string.
#[must_use]
pub fn parse_buffered(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffered_bodies() {
        assert_eq!(parse_buffered(b""), Value::Null);
        assert_eq!(parse_buffered(b"\n"), Value::Null);
        assert_eq!(parse_buffered(b"OK"), json!("OK"));
        assert_eq!(parse_buffered(br#"{"Id":"x"}"#), json!({"Id": "x"}));
    }

    #[tokio::test]
    async fn collect_concatenates_chunks() {
        let stream = ResponseStream::from_chunks(vec![
            Bytes::from_static(b"hel"),
            Bytes::from_static(b"lo"),
        ]);
        assert_eq!(stream.collect().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn outcome_mismatch_is_reported() {
        let err = Outcome::Json(Value::Null).into_stream().unwrap_err();
        assert!(err.to_string().contains("expected a stream outcome"));
    }
}
