// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Vendor `Request-Context` header.
//!
//! Inbound, the header names the application that sent the request. Outbound,
//! on the response, it names the application that served it:
//!
//! ```text
//! Request-Context: appId=cid-v1:4a8b1c2d
//! ```

use crate::headers::{
    carrier::{Extractor, Injector},
    non_empty, truncate, MAX_APP_ID_LENGTH, MAX_HEADER_VALUE_LENGTH, REQUEST_CONTEXT_HEADER,
    REQUEST_CONTEXT_TARGET_KEY,
};

/// Looks up `key` in the `key=value` list of every `Request-Context` line.
///
/// The first non-empty match wins, cut to [`MAX_APP_ID_LENGTH`].
///
/// # Example
///
/// ```
/// use request_correlation::headers::request_context::request_context_value;
///
/// let value = request_context_value(&["roleName=web, appId=cid-v1:1"], "appId");
/// assert_eq!(value.as_deref(), Some("cid-v1:1"));
/// ```
#[must_use]
pub fn request_context_value(values: &[&str], key: &str) -> Option<String> {
    values
        .iter()
        .flat_map(|line| truncate(line, MAX_HEADER_VALUE_LENGTH).split(','))
        .filter_map(|member| member.split_once('='))
        .find(|(k, v)| k.trim() == key && !v.trim().is_empty())
        .map(|(_, v)| truncate(v.trim(), MAX_APP_ID_LENGTH).to_string())
}

/// Reads the caller's application id from a carrier.
#[must_use]
pub fn extract_request_context_value(carrier: &dyn Extractor, key: &str) -> Option<String> {
    let values = carrier.get_all(REQUEST_CONTEXT_HEADER);
    request_context_value(&values, key)
}

/// Formats the outbound `Request-Context` value for `app_id`.
#[must_use]
pub fn format_response_context_header(app_id: &str) -> String {
    format!("{REQUEST_CONTEXT_TARGET_KEY}={app_id}")
}

/// Announces `app_id` on a response carrier without overriding the handler.
///
/// - header absent: it is set to `appId=<app_id>`
/// - header present without `appId`: `,appId=<app_id>` is appended
/// - header already carrying `appId`: left untouched
///
/// Returns `true` if the carrier was changed.
pub fn set_response_context<C>(carrier: &mut C, app_id: &str) -> bool
where
    C: Extractor + Injector + ?Sized,
{
    let current = non_empty(carrier.get(REQUEST_CONTEXT_HEADER)).map(str::to_string);

    let value = match current {
        None => format_response_context_header(app_id),
        Some(existing) => {
            if request_context_value(&[existing.as_str()], REQUEST_CONTEXT_TARGET_KEY).is_some() {
                return false;
            }
            format!("{existing},{}", format_response_context_header(app_id))
        }
    };

    carrier.set(REQUEST_CONTEXT_HEADER, value);
    true
}
