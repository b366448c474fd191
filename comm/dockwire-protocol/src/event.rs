//! Engine event documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: BTreeMap<String, String>,
}

/// One document from the event stream.
///
/// Older engines only send `status`, `id` and `from`; newer ones send the
/// typed fields as well. Both are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// `container`, `image`, `network`, `volume`, `service`, `node`, ...
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Action", default)]
    pub action: String,
    #[serde(rename = "Actor", default)]
    pub actor: Actor,
    /// `local` or `swarm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Seconds since the epoch.
    #[serde(default)]
    pub time: i64,
    /// Nanoseconds since the epoch.
    #[serde(rename = "timeNano", default)]
    pub time_nano: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl Event {
    /// Actor id, falling back to the legacy `id` field.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        if self.actor.id.is_empty() {
            self.id.as_deref().unwrap_or_default()
        } else {
            &self.actor.id
        }
    }

    /// Action, falling back to the legacy `status` field.
    #[must_use]
    pub fn action(&self) -> &str {
        if self.action.is_empty() {
            self.status.as_deref().unwrap_or_default()
        } else {
            &self.action
        }
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.actor.attributes.get(key).map(String::as_str)
    }

    /// Event time, preferring nanosecond precision.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.time_nano != 0 {
            return Some(DateTime::from_timestamp_nanos(self.time_nano));
        }
        DateTime::from_timestamp(self.time, 0)
    }
}
