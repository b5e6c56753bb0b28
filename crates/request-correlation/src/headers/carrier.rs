// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carrier traits for reading and writing correlation headers.
//!
//! Carriers abstract over the header collection a request arrives with, so the
//! codec and the resolver can run against a plain `HashMap` in tests and
//! against `hyper::http::HeaderMap` in a live pipeline.
//!
//! All lookups are case-insensitive: `Request-Id` and `request-id` name the same
//! header.

use std::collections::HashMap;

use hyper::http::{
    header::{HeaderName, HeaderValue},
    HeaderMap,
};
use tracing::debug;

use crate::headers::error::ExtractError;

/// Writes correlation headers into a carrier.
pub trait Injector {
    /// Sets `key` to `value`, replacing any previous value.
    ///
    /// Keys are normalized to lowercase.
    fn set(&mut self, key: &str, value: String);
}

/// Reads correlation headers from a carrier.
pub trait Extractor {
    /// Returns the first value for `key`, if any.
    fn get(&self, key: &str) -> Option<&str>;

    /// Returns every value for `key`, in arrival order.
    ///
    /// Multi-valued headers such as `tracestate` and `Correlation-Context` may
    /// legally be split over several header lines.
    fn get_all(&self, key: &str) -> Vec<&str> {
        self.get(key).into_iter().collect()
    }

    /// Returns every key present in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = HashMap::get(self, &key.to_lowercase()) {
            return Some(value.as_str());
        }

        // Maps built by hand may carry mixed-case keys
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        HashMap::keys(self).map(String::as_str).collect()
    }
}

impl Injector for HeaderMap {
    fn set(&mut self, key: &str, value: String) {
        let Ok(name) = HeaderName::from_bytes(key.to_lowercase().as_bytes()) else {
            debug!("{}", ExtractError::inject("invalid header name", "carrier"));
            return;
        };
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.insert(name, value);
            }
            Err(_) => {
                debug!(
                    "{}",
                    ExtractError::inject("value is not a valid header value", "carrier")
                );
            }
        }
    }
}

impl Extractor for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|value| value.to_str().ok())
    }

    fn get_all(&self, key: &str) -> Vec<&str> {
        HeaderMap::get_all(self, key)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    fn keys(&self) -> Vec<&str> {
        HeaderMap::keys(self).map(HeaderName::as_str).collect()
    }
}
