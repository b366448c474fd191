//! The `filters` query parameter.
//!
//! Every list, search and event call encodes filters the same way: a JSON
//! object mapping a filter name to an array of values, e.g.
//! `{"status":["running"]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Filter values for one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

/// A set of server-side filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one value under `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Adds one or more values under `name`.
    pub fn extend(&mut self, name: impl Into<String>, values: FilterValue) {
        self.0
            .entry(name.into())
            .or_default()
            .extend(values.into_vec());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The JSON text sent as the `filters` query value.
    #[must_use]
    pub fn to_query_value(&self) -> String {
        Value::from(self.clone()).to_string()
    }
}

impl From<Filters> for Value {
    fn from(filters: Filters) -> Self {
        Self::Object(
            filters
                .0
                .into_iter()
                .map(|(name, values)| (name, Self::from(values)))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, FilterValue)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, FilterValue)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (name, values) in iter {
            filters.extend(name, values);
        }
        filters
    }
}
