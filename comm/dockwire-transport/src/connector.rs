//! Connection factory.
//!
//! Turns a [`ConnectionDescriptor`] into a connected byte stream. Every call
//! opens a fresh connection; hyper drives the HTTP exchange on top of it.

use crate::descriptor::{ConnectionDescriptor, Protocol};
use crate::tls;
use dockwire_error::{Error, Result, TransportError};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// A connected engine endpoint.
pub enum Connection {
    Unix(UnixStream),
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = match self.get_mut() {
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        };
        // The peer may already have gone away after a detach.
        match result {
            Poll::Ready(Err(err)) if err.kind() == io::ErrorKind::NotConnected => {
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Opens connections for one descriptor.
#[derive(Clone)]
pub struct Connector {
    descriptor: Arc<ConnectionDescriptor>,
    tls: Option<TlsConnector>,
}

impl Connector {
    /// Creates a connector, preparing the TLS configuration up front.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Tls`] if the TLS material is unusable.
    pub fn new(descriptor: ConnectionDescriptor) -> Result<Self> {
        let tls = match &descriptor {
            ConnectionDescriptor::Tcp {
                protocol: Protocol::Https,
                tls,
                ..
            } => Some(tls::client_connector(&tls.clone().unwrap_or_default())?),
            _ => None,
        };

        Ok(Self {
            descriptor: Arc::new(descriptor),
            tls,
        })
    }

    /// Returns the descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the endpoint cannot be reached or the
    /// TLS handshake fails.
    pub async fn connect(&self) -> Result<Connection> {
        match self.descriptor.as_ref() {
            ConnectionDescriptor::Unix { path } => {
                let stream = UnixStream::connect(path).await.map_err(|e| {
                    tracing::debug!(path = %path.display(), "engine socket connect failed: {}", e);
                    Error::from(e)
                })?;
                Ok(Connection::Unix(stream))
            }
            ConnectionDescriptor::Tcp { host, port, .. } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await.map_err(|e| {
                    tracing::debug!(host = %host, port = *port, "engine tcp connect failed: {}", e);
                    Error::from(e)
                })?;
                stream.set_nodelay(true)?;

                let Some(connector) = &self.tls else {
                    return Ok(Connection::Tcp(stream));
                };
                let name = tls::server_name(host)?;
                let stream = connector
                    .connect(name, stream)
                    .await
                    .map_err(|e| TransportError::Tls(format!("handshake failed: {e}")))?;
                Ok(Connection::Tls(Box::new(stream)))
            }
        }
    }
}
