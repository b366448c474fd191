//! Client configuration.
//!
//! Loaded from several sources, later ones winning:
//!
//! 1. Default values (local Unix socket, API `v1.43`)
//! 2. Configuration file (`~/.config/dockwire/config.toml`, or an explicit path)
//! 3. `DOCKER_HOST`, `DOCKER_CERT_PATH`, `DOCKER_TLS_VERIFY`
//! 4. `DOCKWIRE_*` environment variables (nested keys split on `__`)
//!
//! ## Example Configuration File
//!
//! ```toml
//! host = "tcp://10.0.0.5:2376"
//! api_version = "v1.43"
//! timeout_secs = 30
//! tls_verify = 1
//!
//! [tls]
//! ca = "/etc/dockwire/ca.pem"
//! cert = "/etc/dockwire/cert.pem"
//! key = "/etc/dockwire/key.pem"
//! ```

use crate::options::LooseBool;
use dockwire_constants::api::DEFAULT_API_VERSION;
use dockwire_constants::env::{CONFIG_PREFIX, DOCKER_CERT_PATH, DOCKER_HOST, DOCKER_TLS_VERIFY};
use dockwire_error::{Error, Result};
use dockwire_transport::{ConnectionDescriptor, HttpTransport, TlsMaterial};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// PEM file locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPaths {
    pub ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl TlsPaths {
    fn is_empty(&self) -> bool {
        self.ca.is_none() && self.cert.is_none() && self.key.is_none()
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Engine endpoint (`unix:///path`, `tcp://host:port`, `https://host:port`).
    /// Unset means the default local socket.
    pub host: Option<String>,
    /// Path prefix such as `v1.43`. Empty disables the prefix.
    pub api_version: String,
    /// Bound on connecting and receiving a response head. Streams are never cut.
    pub timeout_secs: Option<u64>,
    /// Force TLS for `tcp://` hosts.
    pub tls_verify: LooseBool,
    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`.
    pub cert_path: Option<PathBuf>,
    /// Explicit PEM paths; these win over `cert_path`.
    pub tls: TlsPaths,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: None,
            tls_verify: LooseBool(false),
            cert_path: None,
            tls: TlsPaths::default(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the user config file and environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(user_config_path()))
    }

    /// Loads configuration from a specific file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Self::figment(Some(path.as_ref().to_path_buf())))
    }

    /// The layered sources, for callers that want to add their own.
    #[must_use]
    pub fn figment(file: Option<PathBuf>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(
                Env::raw()
                    .only(&[DOCKER_HOST, DOCKER_CERT_PATH, DOCKER_TLS_VERIFY])
                    .map(|key| {
                        if key == DOCKER_HOST {
                            "host".into()
                        } else if key == DOCKER_CERT_PATH {
                            "cert_path".into()
                        } else {
                            "tls_verify".into()
                        }
                    }),
            )
            .merge(Env::prefixed(CONFIG_PREFIX).split("__"))
    }

    /// Extracts a configuration from any figment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the sources do not form a valid config.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Resolves the connection descriptor, reading any PEM files.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparseable host or unreadable PEM files.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        let descriptor = match self.host.as_deref().filter(|h| !h.trim().is_empty()) {
            Some(host) => ConnectionDescriptor::parse(host)?,
            None => ConnectionDescriptor::default(),
        };

        if let ConnectionDescriptor::Unix { .. } = descriptor {
            return Ok(descriptor);
        }

        let paths = self.tls_paths();
        if !(descriptor.is_tls() || self.tls_verify.0 || !paths.is_empty()) {
            return Ok(descriptor);
        }

        let material = TlsMaterial {
            ca: read_pem(paths.ca.as_deref())?,
            cert: read_pem(paths.cert.as_deref())?,
            key: read_pem(paths.key.as_deref())?,
        };
        Ok(descriptor.with_tls(material))
    }

    /// Explicit PEM paths, completed from `cert_path`.
    #[must_use]
    pub fn tls_paths(&self) -> TlsPaths {
        let from_dir = |name: &str| self.cert_path.as_ref().map(|dir| dir.join(name));
        TlsPaths {
            ca: self.tls.ca.clone().or_else(|| from_dir("ca.pem")),
            cert: self.tls.cert.clone().or_else(|| from_dir("cert.pem")),
            key: self.tls.key.clone().or_else(|| from_dir("key.pem")),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Builds the HTTP transport this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid hosts or TLS material.
    pub fn transport(&self) -> Result<HttpTransport> {
        let mut transport =
            HttpTransport::new(self.descriptor()?)?.with_api_version(self.api_version.as_str());
        if let Some(timeout) = self.timeout() {
            transport = transport.with_timeout(timeout);
        }
        Ok(transport)
    }
}

fn read_pem(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    path.map(|path| {
        std::fs::read(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))
    })
    .transpose()
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dockwire").join("config.toml"))
}
