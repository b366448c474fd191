//! hyper HTTP/1.1 transport.
//!
//! Opens a new HTTP/1.1 connection for each request. Buffered calls read the
//! whole body; streaming calls hand the body back lazily so the connection
//! stays open until the caller drops the stream; upgrade calls return the raw
//! duplex connection after `101 Switching Protocols`.

use crate::connector::Connector;
use crate::descriptor::ConnectionDescriptor;
use crate::outcome::{parse_buffered, Outcome, ResponseStream, UpgradedConnection};
use crate::request::{RequestBody, RequestDescriptor, ResponseMode};
use crate::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use dockwire_constants::media;
use dockwire_error::{Error, Result, TransportError};
use futures::{StreamExt, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::client::conn::http1;
use hyper::header::{CONNECTION, CONTENT_TYPE, HOST, UPGRADE};
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::io;
use std::time::Duration;

type HttpBody = UnsyncBoxBody<Bytes, io::Error>;

/// Transport that speaks HTTP/1.1 to the engine.
#[derive(Clone)]
pub struct HttpTransport {
    connector: Connector,
    authority: String,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS material cannot be loaded.
    pub fn new(descriptor: ConnectionDescriptor) -> Result<Self> {
        let authority = descriptor.authority();
        Ok(Self {
            connector: Connector::new(descriptor)?,
            authority,
            api_version: None,
            timeout: None,
        })
    }

    /// Prefixes every path with `/<version>`. An empty string disables the prefix.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.api_version = (!version.is_empty()).then_some(version);
        self
    }

    /// Bounds connect + response head. Stream bodies are never cut off.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        self.connector.descriptor()
    }

    /// Returns the API version prefix.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::from(TransportError::Timeout))?,
            None => fut.await,
        }
    }

    async fn send(&self, request: RequestDescriptor, target: String) -> Result<Response<Incoming>> {
        let io = self.connector.connect().await?;

        let (mut sender, conn) = http1::Builder::new()
            .handshake(TokioIo::new(io))
            .await
            .map_err(|e| TransportError::Http(format!("engine handshake failed: {e}")))?;

        // The connection task must keep running for streamed bodies and upgrades.
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                let msg = e.to_string().to_lowercase();
                if !msg.contains("canceled") && !msg.contains("incomplete") {
                    tracing::debug!("engine connection ended: {}", e);
                }
            }
        });

        let RequestDescriptor {
            method,
            headers,
            body,
            mode,
            ..
        } = request;
        let (content_type, body) = into_http_body(body);

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(target)
            .header(HOST, self.authority.as_str());

        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder = if mode == ResponseMode::Upgrade {
            builder.header(CONNECTION, "Upgrade").header(UPGRADE, "tcp")
        } else {
            builder.header(CONNECTION, "close")
        };
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let req = builder
            .body(body)
            .map_err(|e| Error::invalid_request(format!("failed to build engine request: {e}")))?;

        sender.send_request(req).await.map_err(map_hyper_error)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: RequestDescriptor) -> Result<Outcome> {
        let mode = request.mode;
        let target = request.path_and_query(self.api_version.as_deref());
        tracing::debug!(method = %request.method, target = %target, ?mode, "engine request");

        let response = self.bounded(self.send(request, target)).await?;
        let status = response.status();

        if mode == ResponseMode::Upgrade && status == StatusCode::SWITCHING_PROTOCOLS {
            let headers = response.headers().clone();
            let upgraded = hyper::upgrade::on(response)
                .await
                .map_err(|e| TransportError::Http(format!("upgrade failed: {e}")))?;
            return Ok(Outcome::Upgraded(UpgradedConnection::new(
                headers,
                Box::new(TokioIo::new(upgraded)),
            )));
        }

        if !status.is_success() {
            let body = match response.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::debug!(status = status.as_u16(), error = %e, "engine error body unreadable");
                    return Err(map_hyper_error(e));
                }
            };
            tracing::debug!(status = status.as_u16(), "engine error response");
            return Err(Error::engine(status.as_u16(), &body));
        }

        match mode {
            ResponseMode::Json => {
                let body = response
                    .into_body()
                    .collect()
                    .await
                    .map_err(map_hyper_error)?
                    .to_bytes();
                Ok(Outcome::Json(parse_buffered(&body)))
            }
            ResponseMode::Ndjson | ResponseMode::Raw => {
                let (parts, incoming) = response.into_parts();
                let body = incoming.into_data_stream().map_err(io::Error::other).boxed();
                Ok(Outcome::Stream(ResponseStream::new(
                    parts.status.as_u16(),
                    parts.headers,
                    body,
                )))
            }
            ResponseMode::Upgrade => Err(TransportError::Http(format!(
                "engine answered {status} instead of switching protocols"
            ))
            .into()),
        }
    }
}

fn into_http_body(body: RequestBody) -> (Option<&'static str>, HttpBody) {
    match body {
        RequestBody::Empty => (
            None,
            Empty::<Bytes>::new()
                .map_err(|never| match never {})
                .boxed_unsync(),
        ),
        RequestBody::Json(bytes) => (
            Some(media::JSON),
            Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        ),
        RequestBody::Tar(bytes) => (
            Some(media::TAR),
            Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        ),
        RequestBody::TarStream(stream) => (
            Some(media::TAR),
            StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
        ),
    }
}

fn map_hyper_error(err: hyper::Error) -> Error {
    let io_kind = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(io::Error::kind);

    match io_kind {
        Some(kind) => Error::from(io::Error::new(kind, err.to_string())),
        None if err.is_incomplete_message() || err.is_closed() => {
            TransportError::ConnectionReset.into()
        }
        None => TransportError::Http(err.to_string()).into(),
    }
}
