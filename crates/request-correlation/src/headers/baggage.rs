// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `Correlation-Context` baggage header.
//!
//! A comma-separated list of `key=value` pairs, possibly split over several
//! header lines:
//!
//! ```text
//! Correlation-Context: k1=v1, k2=v2
//! Correlation-Context: k3=v3
//! ```

use tracing::debug;

use crate::{
    context::Baggage,
    headers::{
        error::ExtractError, truncate, CORRELATION_CONTEXT_HEADER, MAX_BAGGAGE_KEY_LENGTH,
        MAX_BAGGAGE_PAIRS, MAX_BAGGAGE_VALUE_LENGTH, MAX_HEADER_VALUE_LENGTH,
    },
};

/// Parses every `Correlation-Context` line into one ordered baggage map.
///
/// Each line is cut to [`MAX_HEADER_VALUE_LENGTH`] first. Members without `=`
/// or with an empty key or value are skipped. Keys are cut to
/// [`MAX_BAGGAGE_KEY_LENGTH`] and values to [`MAX_BAGGAGE_VALUE_LENGTH`].
/// When a key repeats, the first occurrence wins. At most
/// [`MAX_BAGGAGE_PAIRS`] members are kept, the rest is ignored.
///
/// # Example
///
/// ```
/// use request_correlation::headers::baggage::parse_baggage;
///
/// let baggage = parse_baggage(&["k1=v1, k2=v2", "k1=other"]);
/// assert_eq!(baggage.get("k1"), Some("v1"));
/// assert_eq!(baggage.get("k2"), Some("v2"));
/// ```
#[must_use]
pub fn parse_baggage(values: &[&str]) -> Baggage {
    let mut baggage = Baggage::new();

    for line in values {
        for member in truncate(line, MAX_HEADER_VALUE_LENGTH).split(',') {
            let Some((key, value)) = member.split_once('=') else {
                if !member.trim().is_empty() {
                    debug!(
                        "{}",
                        ExtractError::extract("baggage member without `=`", CORRELATION_CONTEXT_HEADER)
                    );
                }
                continue;
            };

            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }

            if baggage.len() == MAX_BAGGAGE_PAIRS {
                debug!("baggage has more than {MAX_BAGGAGE_PAIRS} members, ignoring the rest");
                return baggage;
            }

            baggage.insert_if_absent(
                truncate(key, MAX_BAGGAGE_KEY_LENGTH),
                truncate(value, MAX_BAGGAGE_VALUE_LENGTH),
            );
        }
    }

    baggage
}

/// Serializes baggage as a single `Correlation-Context` value.
///
/// Returns `None` for empty baggage, so no empty header is ever sent.
#[must_use]
pub fn format_baggage(baggage: &Baggage) -> Option<String> {
    if baggage.is_empty() {
        return None;
    }

    let value = baggage
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    Some(value)
}
