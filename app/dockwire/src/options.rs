//! Per-call options.
//!
//! Options are an open mapping of option name to JSON value, so every engine
//! parameter can be passed without the client modelling it. Per-proxy
//! defaults and caller options merge shallowly: a caller key replaces the
//! default key of the same name, and nothing else is filled in.

use crate::filters::Filters;
use dockwire_error::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Option names the engine treats as booleans.
///
/// Callers may pass `1`/`0` for these; they are normalized to `true`/`false`
/// before the request is encoded.
pub const BOOLEAN_OPTIONS: &[&str] = &[
    "all",
    "attachStderr",
    "attachStdin",
    "attachStdout",
    "Detach",
    "digests",
    "follow",
    "force",
    "forcerm",
    "link",
    "logs",
    "noOverwriteDirNonDir",
    "noprune",
    "nocache",
    "one-shot",
    "pause",
    "pull",
    "q",
    "quiet",
    "rm",
    "rotateManagerToken",
    "rotateManagerUnlockKey",
    "rotateWorkerToken",
    "size",
    "squash",
    "stderr",
    "stdin",
    "stdout",
    "stream",
    "timestamps",
    "Tty",
    "v",
];

/// A boolean that also accepts `1`/`0` and their string forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LooseBool(pub bool);

impl LooseBool {
    /// Interprets a JSON value as a loose boolean.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Self(true)),
                Some(0) => Some(Self(false)),
                _ => None,
            },
            Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }

    fn from_text(text: &str) -> Option<Self> {
        match text.trim() {
            "1" => Some(Self(true)),
            "0" => Some(Self(false)),
            t if t.eq_ignore_ascii_case("true") => Some(Self(true)),
            t if t.eq_ignore_ascii_case("false") => Some(Self(false)),
            _ => None,
        }
    }
}

impl From<bool> for LooseBool {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl From<LooseBool> for bool {
    fn from(value: LooseBool) -> Self {
        value.0
    }
}

impl From<LooseBool> for Value {
    fn from(value: LooseBool) -> Self {
        Self::Bool(value.0)
    }
}

impl Serialize for LooseBool {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

impl<'de> Deserialize<'de> for LooseBool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LooseBoolVisitor;

        impl Visitor<'_> for LooseBoolVisitor {
            type Value = LooseBool;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("true, false, 1 or 0")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<LooseBool, E> {
                Ok(LooseBool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<LooseBool, E> {
                match v {
                    1 => Ok(LooseBool(true)),
                    0 => Ok(LooseBool(false)),
                    _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<LooseBool, E> {
                match v {
                    1 => Ok(LooseBool(true)),
                    0 => Ok(LooseBool(false)),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<LooseBool, E> {
                LooseBool::from_text(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(LooseBoolVisitor)
    }
}

/// Options for one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Sets a boolean option from anything loosely boolean.
    #[must_use]
    pub fn flag(self, key: impl Into<String>, value: impl Into<LooseBool>) -> Self {
        let flag: LooseBool = value.into();
        self.set(key, flag)
    }

    /// Sets the `filters` option.
    #[must_use]
    pub fn filters(self, filters: Filters) -> Self {
        self.set("filters", filters)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads an option as a loose boolean.
    #[must_use]
    pub fn flag_value(&self, key: &str) -> Option<bool> {
        self.get(key)
            .and_then(LooseBool::from_value)
            .map(bool::from)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Converts any serializable map-like value into options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the value does not serialize to a
    /// JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(Error::invalid_request(format!(
                "options must be an object, got {other}"
            ))),
        }
    }

    /// Shallow merge: caller keys win, defaults fill the rest.
    #[must_use]
    pub fn merged(defaults: Option<&Self>, caller: Option<&Self>) -> Self {
        let mut merged = defaults.cloned().unwrap_or_default();
        if let Some(caller) = caller {
            for (key, value) in &caller.0 {
                merged.0.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Rewrites `1`/`0` to `true`/`false` for known boolean options.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for (key, value) in &mut self.0 {
            if BOOLEAN_OPTIONS.contains(&key.as_str()) {
                if let Some(flag) = LooseBool::from_value(value) {
                    *value = flag.into();
                }
            }
        }
        self
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Options {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_serialize(&value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Immutable per-operation defaults held by a resource proxy.
///
/// Keys are operation names such as `"logs"` or `"remove"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultOptions(BTreeMap<String, Options>);

impl DefaultOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the defaults for one operation.
    #[must_use]
    pub fn with(mut self, operation: impl Into<String>, options: Options) -> Self {
        self.0.insert(operation.into(), options);
        self
    }

    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&Options> {
        self.0.get(operation)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
