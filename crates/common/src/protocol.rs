//! Trace-context carriers exchanged between components.
//!
//! A [`Carrier`] is the string map that travels alongside a message (HTTP
//! headers, queue message metadata, a JSON envelope) and holds the W3C
//! `traceparent` / `tracestate` entries needed to continue a trace.

use std::collections::BTreeMap;

use opentelemetry::propagation::{Extractor, Injector};
use serde::{Deserialize, Serialize};

/// Key of the W3C trace-context parent header.
pub const TRACEPARENT_KEY: &str = "traceparent";

/// Key of the W3C trace-context vendor state header.
pub const TRACESTATE_KEY: &str = "tracestate";

// ---------------------------------------------------------------------------
// Carrier
// ---------------------------------------------------------------------------

/// String map holding propagated trace context.
///
/// Serialised as a plain JSON object so it can be embedded in any payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Carrier {
    entries: BTreeMap<String, String>,
}

impl Carrier {
    /// Create an empty carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) an entry, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Build a carrier from a JSON value.
    ///
    /// Only a JSON object that holds a `traceparent` entry qualifies. Non-string
    /// values are rendered with their JSON representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.contains_key(TRACEPARENT_KEY) {
            return None;
        }
        let entries = object
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect();
        Some(Self { entries })
    }

    /// The `traceparent` entry, if present.
    pub fn traceparent(&self) -> Option<&str> {
        self.get(TRACEPARENT_KEY)
    }

    /// Returns `true` if the carrier holds a `traceparent` entry.
    pub fn has_parent(&self) -> bool {
        self.traceparent().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry. Header names are case-insensitive, so an exact match
    /// is tried first and a case-insensitive scan second.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

impl Extractor for Carrier {
    fn get(&self, key: &str) -> Option<&str> {
        Carrier::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl Injector for Carrier {
    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }
}

impl FromIterator<(String, String)> for Carrier {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
