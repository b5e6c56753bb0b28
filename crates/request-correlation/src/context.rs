// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace identity of a request and the ordered key/value maps that travel
//! with it.
//!
//! # Trace Identity
//!
//! A [`TraceIdentity`] associates the telemetry of one request with the
//! distributed operation it belongs to:
//!
//! - **`trace_id`**: 128-bit operation id, 32 lowercase hex digits
//! - **`span_id`**: 64-bit id of this request's leg, 16 lowercase hex digits
//! - **`parent_span_id`**: span id of the caller, when a W3C parent was received
//! - **`sampled`**: bit 0 of the W3C trace flags
//! - **`trace_state`**: the caller's `tracestate`, re-serialized and bounded
//! - **`baggage`**: propagated user key/value pairs
//! - **`source_app_id`**: application id of the caller, when it announced one
//!
//! The all-zero trace and span ids are reserved; the generators below never
//! return them.

use rand::Rng;
use serde::{ser::SerializeMap, Serialize, Serializer};

/// Insertion-ordered string map where the first writer of a key wins.
///
/// Used for baggage and for telemetry properties. Duplicate keys arriving later
/// (a second baggage header, baggage copied over caller-set properties) never
/// replace an earlier value unless [`OrderedMap::insert`] is used explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderedMap {
    entries: Vec<(String, String)>,
}

/// Propagated user key/value pairs.
pub type Baggage = OrderedMap;

impl OrderedMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` only if it is not present yet. Returns `true` if inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    /// Inserts or replaces `key`, keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Copies every entry of `other` whose key is not present yet.
    pub fn merge_absent(&mut self, other: &OrderedMap) {
        for (k, v) in other.iter() {
            self.insert_if_absent(k, v);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert_if_absent(k, v);
        }
        map
    }
}

/// Serialized as a JSON object, in insertion order.
impl Serialize for OrderedMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Reconciled trace identity of one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceIdentity {
    /// 32 lowercase hex digits, never all zero.
    pub trace_id: String,
    /// 16 lowercase hex digits, never all zero.
    pub span_id: String,
    /// Span id of the W3C caller, 16 lowercase hex digits.
    pub parent_span_id: Option<String>,
    pub sampled: bool,
    /// Re-serialized inbound `tracestate`.
    pub trace_state: Option<String>,
    pub baggage: Baggage,
    /// Application id announced by the caller.
    pub source_app_id: Option<String>,
}

impl TraceIdentity {
    /// Creates a root identity with freshly generated ids.
    pub fn new_root<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            trace_id: generate_trace_id(rng),
            span_id: generate_span_id(rng),
            sampled: true,
            ..Default::default()
        }
    }

    /// Legacy-format id of this leg: `|<trace_id>.<span_id>.`.
    #[must_use]
    pub fn hierarchical_id(&self) -> String {
        format!("|{}.{}.", self.trace_id, self.span_id)
    }
}

/// Generates a random, non-zero 128-bit trace id as 32 lowercase hex digits.
pub fn generate_trace_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    loop {
        let id: u128 = rng.random();
        if id != 0 {
            return format!("{id:032x}");
        }
    }
}

/// Generates a random, non-zero 64-bit span id as 16 lowercase hex digits.
pub fn generate_span_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    loop {
        let id: u64 = rng.random();
        if id != 0 {
            return format!("{id:016x}");
        }
    }
}
