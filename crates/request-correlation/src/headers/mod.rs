// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Header codec for the correlation protocols.
//!
//! Three mutually incompatible protocols can carry the identity of an inbound
//! request:
//!
//! - **W3C Trace Context**: `traceparent` and `tracestate`
//! - **Legacy hierarchical ids**: `Request-Id` (`|root.segment1.segment2.`)
//! - **Vendor root/parent pair**: `x-ms-request-root-id` and `x-ms-request-id`
//!
//! Alongside them travel the `Correlation-Context` baggage header and the
//! vendor `Request-Context` header, which carries application ids in both
//! directions.
//!
//! # Header Format Examples
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! tracestate: az=cid-v1:upstream,congo=t61rcWkgMzE
//! Request-Id: |4bf92f3577b34da6a3ce929d0e0e4736.00f067aa.
//! Correlation-Context: k1=v1,k2=v2
//! Request-Context: appId=cid-v1:upstream
//! ```
//!
//! Every parser in this module fails closed. Malformed input yields "absent",
//! never an error that could abort request processing, and every value is cut
//! to a fixed bound before it is parsed.

pub mod baggage;
pub mod carrier;
pub mod error;
pub mod legacy;
pub mod request_context;
pub mod w3c;

/// W3C `traceparent` header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// W3C `tracestate` header.
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Legacy hierarchical request id header.
pub const REQUEST_ID_HEADER: &str = "request-id";

/// Legacy baggage header.
pub const CORRELATION_CONTEXT_HEADER: &str = "correlation-context";

/// Vendor root id header (operation id of the caller).
pub const ROOT_ID_HEADER: &str = "x-ms-request-root-id";

/// Vendor parent id header (id of the calling operation).
pub const PARENT_ID_HEADER: &str = "x-ms-request-id";

/// Vendor request context header. Carries `appId=<id>` inbound (source) and
/// outbound (target).
pub const REQUEST_CONTEXT_HEADER: &str = "request-context";

/// Key of the source application id in an inbound `Request-Context` header.
pub const REQUEST_CONTEXT_SOURCE_KEY: &str = "appId";

/// Key of the target application id in an outbound `Request-Context` header.
pub const REQUEST_CONTEXT_TARGET_KEY: &str = "appId";

/// Vendor namespace inside `tracestate` carrying the caller's application id.
pub const TRACESTATE_VENDOR_NAMESPACE: &str = "az";

/// Maximum length of a root id, parent id or request id header value.
pub const MAX_HEADER_VALUE_LENGTH: usize = 1024;

/// Maximum length of a `traceparent` value (`00-` + 32 + `-` + 16 + `-` + 2).
pub const MAX_TRACEPARENT_LENGTH: usize = 55;

/// Maximum length of a single `tracestate` header line.
pub const MAX_TRACESTATE_LENGTH: usize = 512;

/// Maximum number of `tracestate` list members.
pub const MAX_TRACESTATE_PAIRS: usize = 32;

/// Maximum length of a baggage key.
pub const MAX_BAGGAGE_KEY_LENGTH: usize = 50;

/// Maximum length of a baggage value.
pub const MAX_BAGGAGE_VALUE_LENGTH: usize = 256;

/// Maximum number of baggage members, across every `Correlation-Context` line.
pub const MAX_BAGGAGE_PAIRS: usize = 64;

/// Maximum length of an application id.
pub const MAX_APP_ID_LENGTH: usize = 50;

/// Cuts `value` to at most `max` bytes without splitting a UTF-8 character.
///
/// The prefix is kept: roots and ids are built from the front of the string.
#[must_use]
pub fn truncate(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }

    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Trims `value` and returns `None` when nothing is left.
///
/// An empty header is treated exactly like a missing one.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_prefix() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes
        assert_eq!(truncate("aé", 2), "a");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x"));
    }
}
