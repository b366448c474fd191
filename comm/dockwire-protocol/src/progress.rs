//! Pull, push, build and load progress documents.

use dockwire_error::{EngineBody, EngineError, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One document of an image progress stream.
///
/// Failures arrive in-band with a 200 status: the stream carries a document
/// with `error` set and then ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(
        rename = "progressDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub progress_detail: Option<ProgressDetail>,
    /// Build output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorDetail", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    /// Auxiliary data, such as the built image id or pushed digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Value>,
}

impl ProgressEvent {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some() || self.error_detail.is_some()
    }

    /// Turns an in-band error document into an [`Error::Engine`].
    ///
    /// # Errors
    ///
    /// Returns the engine error carried by the document, if any. The status
    /// is the document's error code when it fits, else 500.
    pub fn into_result(self) -> Result<Self> {
        if !self.is_error() {
            return Ok(self);
        }

        let detail = self.error_detail.clone().unwrap_or_default();
        let message = self
            .error
            .clone()
            .or(detail.message)
            .unwrap_or_else(|| "unknown error".to_string());
        let status = detail
            .code
            .and_then(|code| u16::try_from(code).ok())
            .filter(|code| *code >= 400)
            .unwrap_or(500);

        tracing::debug!(status, %message, "in-band progress error");
        Err(Error::Engine(EngineError {
            status,
            body: EngineBody::Message(message),
        }))
    }
}
