//! Engine (non-2xx) responses.

use std::fmt;

/// Body of a failed engine response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineBody {
    /// The `message` field of a JSON error document.
    Message(String),
    /// The body as text, when it was not a JSON error document.
    Raw(String),
}

/// A non-2xx engine response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// HTTP status code.
    pub status: u16,
    /// Parsed message or raw body.
    pub body: EngineBody,
}

impl EngineError {
    /// Parses a failed response body.
    ///
    /// The engine answers errors with `{"message": "..."}`; anything else is
    /// kept verbatim as text.
    #[must_use]
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            });

        let body = match parsed {
            Some(message) => EngineBody::Message(message),
            None => EngineBody::Raw(String::from_utf8_lossy(body).trim().to_string()),
        };

        Self { status, body }
    }

    /// Returns the message, or the raw text when the body was not structured.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.body {
            EngineBody::Message(msg) | EngineBody::Raw(msg) => msg,
        }
    }

    /// Returns true if the engine returned a structured error document.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self.body, EngineBody::Message(_))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            EngineBody::Message(msg) => write!(f, "engine returned {}: {msg}", self.status),
            EngineBody::Raw(raw) if raw.is_empty() => {
                write!(f, "engine returned {} with an empty body", self.status)
            }
            EngineBody::Raw(raw) => write!(f, "engine returned {}: {raw}", self.status),
        }
    }
}

impl std::error::Error for EngineError {}
