//! Request descriptors.

use bytes::Bytes;
use futures::Stream;
use hyper::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::io;
use std::pin::Pin;

/// Characters left untouched in query keys and values.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Streaming request body (build contexts, image tarballs).
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// How the response body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Buffer the body and parse it as one JSON document.
    Json,
    /// Stream newline-delimited JSON documents.
    Ndjson,
    /// Stream raw bytes (logs, archives, tarballs).
    Raw,
    /// Switch protocols and hand back the duplex connection.
    Upgrade,
}

/// Request body.
pub enum RequestBody {
    Empty,
    /// Serialized JSON document.
    Json(Bytes),
    /// In-memory tar archive.
    Tar(Bytes),
    /// Tar archive streamed from elsewhere.
    TarStream(BodyStream),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Json(body) => f.debug_tuple("Json").field(&body.len()).finish(),
            Self::Tar(body) => f.debug_tuple("Tar").field(&body.len()).finish(),
            Self::TarStream(_) => f.write_str("TarStream(..)"),
        }
    }
}

/// One fully-resolved engine call.
///
/// Identifiers are already substituted into `path` and every query value is
/// already serialized; the transport does no further interpretation.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path without the API version prefix, e.g. `/containers/abc/start`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub mode: ResponseMode,
}

impl RequestDescriptor {
    /// Creates a bodiless descriptor expecting a JSON response.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            mode: ResponseMode::Json,
        }
    }

    /// Renders the request target, prefixing the API version when given.
    #[must_use]
    pub fn path_and_query(&self, api_version: Option<&str>) -> String {
        let mut target = match api_version {
            Some(version) => format!("/{}{}", version.trim_matches('/'), self.path),
            None => self.path.clone(),
        };

        for (i, (key, value)) in self.query.iter().enumerate() {
            target.push(if i == 0 { '?' } else { '&' });
            target.extend(utf8_percent_encode(key, QUERY));
            target.push('=');
            target.extend(utf8_percent_encode(value, QUERY));
        }
        target
    }

    /// Returns the first query value for `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
