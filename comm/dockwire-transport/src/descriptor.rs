//! Connection descriptors.

use dockwire_constants::socket::{DEFAULT_SOCKET_PATH, DEFAULT_TCP_PORT, DEFAULT_TLS_PORT};
use dockwire_error::{Result, TransportError};
use std::fmt;
use std::path::{Path, PathBuf};

/// Scheme used for TCP endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

/// PEM-encoded TLS material for `https` endpoints.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    /// CA bundle the engine certificate is verified against.
    pub ca: Option<Vec<u8>>,
    /// Client certificate chain.
    pub cert: Option<Vec<u8>>,
    /// Client private key.
    pub key: Option<Vec<u8>>,
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca", &self.ca.as_ref().map(Vec::len))
            .field("cert", &self.cert.as_ref().map(Vec::len))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Unix domain socket.
    Unix { path: PathBuf },
    /// TCP, optionally wrapped in TLS.
    Tcp {
        host: String,
        port: u16,
        protocol: Protocol,
        tls: Option<TlsMaterial>,
    },
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self::unix(DEFAULT_SOCKET_PATH)
    }
}

impl ConnectionDescriptor {
    /// Creates a Unix socket descriptor.
    #[must_use]
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Self::Unix {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a plain-text TCP descriptor.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
            protocol: Protocol::Http,
            tls: None,
        }
    }

    /// Creates a TLS descriptor.
    #[must_use]
    pub fn https(host: impl Into<String>, port: u16, tls: TlsMaterial) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
            protocol: Protocol::Https,
            tls: Some(tls),
        }
    }

    /// Parses an endpoint in `DOCKER_HOST` form.
    ///
    /// Accepts `unix:///path`, a bare absolute path, `tcp://host[:port]`,
    /// `http://host[:port]` and `https://host[:port]`. A missing port falls
    /// back to 2375 (plain) or 2376 (TLS).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] for unknown schemes,
    /// empty hosts or unparseable ports.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();

        if let Some(path) = endpoint.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid(endpoint));
            }
            return Ok(Self::unix(path));
        }
        if endpoint.starts_with('/') {
            return Ok(Self::unix(endpoint));
        }

        let (protocol, rest) = if let Some(rest) = endpoint.strip_prefix("tcp://") {
            (Protocol::Http, rest)
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            (Protocol::Http, rest)
        } else if let Some(rest) = endpoint.strip_prefix("https://") {
            (Protocol::Https, rest)
        } else {
            return Err(invalid(endpoint));
        };

        let rest = rest.trim_end_matches('/');
        let default_port = match protocol {
            Protocol::Http => DEFAULT_TCP_PORT,
            Protocol::Https => DEFAULT_TLS_PORT,
        };
        let (host, port) = split_host_port(rest, default_port).ok_or_else(|| invalid(endpoint))?;

        Ok(Self::Tcp {
            host,
            port,
            protocol,
            tls: (protocol == Protocol::Https).then(TlsMaterial::default),
        })
    }

    /// Attaches TLS material, switching a TCP endpoint to `https`.
    ///
    /// Unix descriptors are returned unchanged.
    #[must_use]
    pub fn with_tls(self, material: TlsMaterial) -> Self {
        match self {
            Self::Tcp { host, port, .. } => Self::https(host, port, material),
            unix @ Self::Unix { .. } => unix,
        }
    }

    /// Returns true if connections are TLS-wrapped.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(
            self,
            Self::Tcp {
                protocol: Protocol::Https,
                ..
            }
        )
    }

    /// Value for the `Host` header.
    #[must_use]
    pub fn authority(&self) -> String {
        match self {
            Self::Unix { .. } => "localhost".to_string(),
            Self::Tcp { host, port, .. } if host.contains(':') => format!("[{host}]:{port}"),
            Self::Tcp { host, port, .. } => format!("{host}:{port}"),
        }
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
            Self::Tcp {
                protocol: Protocol::Http,
                ..
            } => write!(f, "tcp://{}", self.authority()),
            Self::Tcp {
                protocol: Protocol::Https,
                ..
            } => write!(f, "https://{}", self.authority()),
        }
    }
}

fn invalid(endpoint: &str) -> dockwire_error::Error {
    TransportError::InvalidAddress(endpoint.to_string()).into()
}

fn split_host_port(authority: &str, default_port: u16) -> Option<(String, u16)> {
    // [v6]:port or [v6]
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None if tail.is_empty() => default_port,
            None => return None,
        };
        return (!host.is_empty()).then(|| (host.to_string(), port));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (authority, default_port),
    };
    (!host.is_empty()).then(|| (host.to_string(), port))
}
