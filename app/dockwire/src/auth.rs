//! Registry credentials.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use dockwire_error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Credentials for one registry.
///
/// Sent base64url-encoded in the `X-Registry-Auth` header. When `key` is set
/// it is sent verbatim instead, for callers that already hold an encoded
/// value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serveraddress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identitytoken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrytoken: Option<String>,
    #[serde(skip)]
    pub key: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn credentials(
        username: impl Into<String>,
        password: impl Into<String>,
        serveraddress: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            serveraddress: Some(serveraddress.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn identity_token(token: impl Into<String>, serveraddress: impl Into<String>) -> Self {
        Self {
            identitytoken: Some(token.into()),
            serveraddress: Some(serveraddress.into()),
            ..Self::default()
        }
    }

    /// Wraps an already-encoded header value.
    #[must_use]
    pub fn encoded(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Header value for `X-Registry-Auth`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("serveraddress", &self.serveraddress)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("identitytoken", &self.identitytoken.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Credentials for several registries, keyed by registry address.
///
/// Sent with image builds in the `X-Registry-Config` header so base images
/// can be pulled from private registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryConfig(pub BTreeMap<String, AuthConfig>);

impl RegistryConfig {
    #[must_use]
    pub fn with(mut self, registry: impl Into<String>, auth: AuthConfig) -> Self {
        self.0.insert(registry.into(), auth);
        self
    }

    /// Header value for `X-Registry-Config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
    }
}
