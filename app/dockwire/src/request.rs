//! Request building.
//!
//! Every proxy operation compiles to one [`RequestBuilder`]: defaults and
//! caller options are merged, query values are serialized, and the body and
//! response mode are fixed before the transport is invoked.

use crate::auth::{AuthConfig, RegistryConfig};
use crate::options::Options;
use bytes::Bytes;
use dockwire_constants::api::{REGISTRY_AUTH_HEADER, REGISTRY_CONFIG_HEADER};
use dockwire_error::{Error, Result};
use dockwire_transport::{
    BodyStream, Method, Outcome, RequestBody, RequestDescriptor, ResponseMode, Transport,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// A tar archive to upload.
pub enum TarSource {
    /// Archive held in memory.
    Bytes(Bytes),
    /// Archive read from disk while uploading.
    File(PathBuf),
    /// Archive produced by another stream.
    Stream(BodyStream),
}

impl TarSource {
    /// Opens the archive as a request body.
    ///
    /// # Errors
    ///
    /// Returns an error if a file source cannot be opened.
    pub async fn into_body(self) -> Result<RequestBody> {
        match self {
            Self::Bytes(bytes) => Ok(RequestBody::Tar(bytes)),
            Self::Stream(stream) => Ok(RequestBody::TarStream(stream)),
            Self::File(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    Error::invalid_request(format!("cannot open {}: {e}", path.display()))
                })?;
                Ok(RequestBody::TarStream(ReaderStream::new(file).boxed()))
            }
        }
    }
}

impl From<Bytes> for TarSource {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for TarSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<PathBuf> for TarSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl std::fmt::Debug for TarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Serializes options into query pairs.
///
/// Strings pass through, booleans become `true`/`false`, numbers their
/// decimal text, arrays repeat the key once per element, and objects
/// (filters, labels, build args) become JSON text. `null` omits the key.
#[must_use]
pub fn encode_query(options: &Options) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(options.len());
    for (key, value) in options.iter() {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Builds one [`RequestDescriptor`].
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Options,
    headers: Vec<(String, String)>,
    body: RequestBody,
    mode: ResponseMode,
    versioned: bool,
    error: Option<Error>,
}

impl RequestBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Options::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            mode: ResponseMode::Json,
            versioned: false,
            error: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Merges defaults and caller options into the query string.
    pub fn options(mut self, defaults: Option<&Options>, caller: Option<&Options>) -> Self {
        let merged = Options::merged(defaults, caller).normalized();
        for (key, value) in merged.into_map() {
            self.query.insert(key, value);
        }
        self
    }

    /// Sets one query parameter, replacing any merged value.
    pub fn query(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.query.insert(key, value);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = RequestBody::Json(bytes.into()),
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    /// Merges defaults and caller options into a JSON body.
    pub fn json_options(self, defaults: Option<&Options>, caller: Option<&Options>) -> Self {
        let merged = Options::merged(defaults, caller).normalized();
        self.json(&merged)
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Adds `X-Registry-Auth` when credentials are given.
    pub fn registry_auth(self, auth: Option<&AuthConfig>) -> Self {
        match auth.map(AuthConfig::encode) {
            None => self,
            Some(Ok(value)) => self.header(REGISTRY_AUTH_HEADER, value),
            Some(Err(e)) => self.fail(e),
        }
    }

    /// Adds `X-Registry-Config` when credentials are given.
    pub fn registry_config(self, config: Option<&RegistryConfig>) -> Self {
        match config.map(RegistryConfig::encode) {
            None => self,
            Some(Ok(value)) => self.header(REGISTRY_CONFIG_HEADER, value),
            Some(Err(e)) => self.fail(e),
        }
    }

    pub fn mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Marks the call as a versioned update: stale version tokens surface as
    /// [`Error::Conflict`].
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    fn fail(mut self, error: Error) -> Self {
        self.error.get_or_insert(error);
        self
    }

    /// Produces the descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building (body serialization,
    /// credential encoding).
    pub fn build(self) -> Result<RequestDescriptor> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(RequestDescriptor {
            method: self.method,
            path: self.path,
            query: encode_query(&self.query),
            headers: self.headers,
            body: self.body,
            mode: self.mode,
        })
    }

    /// Builds and executes the request.
    ///
    /// # Errors
    ///
    /// Returns build errors and whatever the transport reports.
    pub async fn send(self, transport: &dyn Transport) -> Result<Outcome> {
        let versioned = self.versioned;
        let descriptor = self.build()?;
        let result = transport.execute(descriptor).await;
        if versioned {
            result.map_err(Error::into_version_conflict)
        } else {
            result
        }
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("versioned", &self.versioned)
            .finish_non_exhaustive()
    }
}
