//! Listing filters
//!
//! Filters are forwarded to the listing endpoint as query parameters. Their
//! serialized form doubles as the cache key for the whole buffer: a different
//! serialization means a different result set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use url::form_urlencoded;

/// Query parameters owned by the pager itself.
pub const RESERVED_KEYS: [&str; 2] = ["skip", "limit"];

/// A single filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    /// Empty strings are treated the same as an unset filter.
    pub fn is_blank(&self) -> bool {
        matches!(self, FilterValue::Text(text) if text.is_empty())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Int(value) => write!(f, "{}", value),
            FilterValue::Float(value) => write!(f, "{}", value),
            FilterValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

/// Rejected filter definitions. These are caller bugs, reported before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter key must not be empty")]
    EmptyKey,
    #[error("filter key '{0}' is reserved for paging")]
    ReservedKey(String),
}

/// Ordered filter mapping. `None` marks a filter that is declared but unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFilters {
    entries: BTreeMap<String, Option<FilterValue>>,
}

impl RequestFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.entries.insert(key.into(), Some(value.into()));
    }

    /// Keep the key but leave it out of requests.
    pub fn unset(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), None);
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.entries.remove(key).flatten()
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    /// Filters that end up on the wire, in key order.
    pub fn defined(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().filter_map(|(key, value)| match value {
            Some(value) if !value.is_blank() => Some((key.as_str(), value)),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.defined().next().is_none()
    }

    /// Stable, form-encoded `key=value&...` form of the defined filters, as
    /// it appears on the wire.
    pub fn serialized(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.defined() {
            serializer.append_pair(key, &value.to_string());
        }
        serializer.finish()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        for key in self.entries.keys() {
            if key.trim().is_empty() {
                return Err(FilterError::EmptyKey);
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(FilterError::ReservedKey(key.clone()));
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for RequestFilters
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (key, value) in iter {
            filters.set(key, value);
        }
        filters
    }
}
