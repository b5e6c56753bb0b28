// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! W3C Trace Context: `traceparent` and `tracestate`.
//!
//! ```text
//! traceparent: 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! tracestate: az=cid-v1:upstream,congo=t61rcWkgMzE
//! ```
//!
//! Only version `00` is understood. Trace and span ids are 32 and 16 hex
//! digits; the all-zero value of either is reserved and rejected. Hex digits are
//! accepted in either case and normalized to lowercase.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::headers::{
    error::ExtractError, truncate, MAX_APP_ID_LENGTH, MAX_TRACEPARENT_LENGTH,
    MAX_TRACESTATE_LENGTH, MAX_TRACESTATE_PAIRS, TRACEPARENT_HEADER,
};

lazy_static! {
    /// `version-traceId-spanId-flags`, nothing after the flags.
    static ref TRACEPARENT_REGEX: Regex =
        Regex::new(r"(?i)^([a-f0-9]{2})-([a-f0-9]{32})-([a-f0-9]{16})-([a-f0-9]{2})$")
            .expect("failed creating regex");

    /// All-zero segment.
    static ref INVALID_SEGMENT_REGEX: Regex = Regex::new(r"^0+$").expect("failed creating regex");

    /// Simple (`vendor`) or multi-tenant (`tenant@vendor`) list member key.
    static ref TRACESTATE_KEY_REGEX: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9_\-*/]{0,240}(@[a-z][a-z0-9_\-*/]{0,13})?$")
            .expect("failed creating regex");

    /// Printable ASCII without `,` and `=`, no trailing space.
    static ref TRACESTATE_VALUE_REGEX: Regex =
        Regex::new(r"^[\x20-\x2b\x2d-\x3c\x3e-\x7e]{0,255}[\x21-\x2b\x2d-\x3c\x3e-\x7e]$")
            .expect("failed creating regex");
}

/// Parsed `traceparent` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traceparent {
    /// 32 lowercase hex digits.
    pub trace_id: String,
    /// Span id of the caller, 16 lowercase hex digits.
    pub parent_span_id: String,
    /// Bit 0 of the flags byte.
    pub sampled: bool,
}

/// Parses a `traceparent` header value.
///
/// # Errors
///
/// Returns an [`ExtractError`] when the value does not match
/// `version-traceId-spanId-flags`, uses a version other than `00`, or carries
/// an all-zero trace or span id. The value is cut to
/// [`MAX_TRACEPARENT_LENGTH`] before it is matched, so anything past the flags
/// of an over-long header is ignored.
///
/// # Example
///
/// ```
/// use request_correlation::headers::w3c::parse_traceparent;
///
/// let tp = parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").unwrap();
/// assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
/// assert_eq!(tp.parent_span_id, "00f067aa0ba902b7");
/// assert!(tp.sampled);
/// ```
pub fn parse_traceparent(value: &str) -> Result<Traceparent, ExtractError> {
    let value = value.trim();
    if value.len() > MAX_TRACEPARENT_LENGTH {
        debug!("traceparent longer than {MAX_TRACEPARENT_LENGTH} characters, dropping the tail");
    }
    let value = truncate(value, MAX_TRACEPARENT_LENGTH);

    let captures = TRACEPARENT_REGEX
        .captures(value)
        .ok_or_else(|| ExtractError::extract("invalid traceparent", TRACEPARENT_HEADER))?;

    let version = &captures[1];
    if version != "00" {
        return Err(ExtractError::extract(
            "unsupported traceparent version",
            TRACEPARENT_HEADER,
        ));
    }

    let trace_id = &captures[2];
    if INVALID_SEGMENT_REGEX.is_match(trace_id) {
        return Err(ExtractError::extract(
            "`0` value for trace_id is invalid",
            TRACEPARENT_HEADER,
        ));
    }

    let span_id = &captures[3];
    if INVALID_SEGMENT_REGEX.is_match(span_id) {
        return Err(ExtractError::extract(
            "`0` value for span_id is invalid",
            TRACEPARENT_HEADER,
        ));
    }

    let flags = u8::from_str_radix(&captures[4], 16)
        .map_err(|_| ExtractError::extract("Failed to decode trace_flags", TRACEPARENT_HEADER))?;

    Ok(Traceparent {
        trace_id: trace_id.to_ascii_lowercase(),
        parent_span_id: span_id.to_ascii_lowercase(),
        sampled: flags & 0x1 != 0,
    })
}

/// Formats a version `00` `traceparent` header value.
#[must_use]
pub fn format_traceparent(trace_id: &str, span_id: &str, sampled: bool) -> String {
    format!("00-{trace_id}-{span_id}-{:02x}", u8::from(sampled))
}

/// Parses one or more `tracestate` header lines into ordered list members.
///
/// Each line is cut to [`MAX_TRACESTATE_LENGTH`]; a member split by the cut is
/// dropped rather than kept half-read. Malformed members are skipped and at
/// most [`MAX_TRACESTATE_PAIRS`] members are returned.
#[must_use]
pub fn parse_tracestate(values: &[&str]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for value in values {
        let bounded = if value.len() > MAX_TRACESTATE_LENGTH {
            debug!(
                "tracestate longer than {MAX_TRACESTATE_LENGTH} characters, dropping the tail"
            );
            let cut = truncate(value, MAX_TRACESTATE_LENGTH);
            cut.rfind(',').map_or("", |i| &cut[..i])
        } else {
            value
        };

        for member in bounded.split(',').map(str::trim) {
            if member.is_empty() {
                continue;
            }

            if pairs.len() == MAX_TRACESTATE_PAIRS {
                debug!("tracestate has more than {MAX_TRACESTATE_PAIRS} members, ignoring the rest");
                return pairs;
            }

            let Some((key, val)) = member.split_once('=') else {
                debug!("Skipping malformed tracestate member {member}");
                continue;
            };

            if !TRACESTATE_KEY_REGEX.is_match(key) || !TRACESTATE_VALUE_REGEX.is_match(val) {
                debug!("Skipping invalid tracestate member {member}");
                continue;
            }

            pairs.push((key.to_string(), val.to_string()));
        }
    }

    pairs
}

/// Formats tracestate list members back into a header value.
#[must_use]
pub fn format_tracestate(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the value of the single tracestate member named `namespace`.
///
/// More than one member with the same key is ambiguous and treated as absent.
/// The value is cut to [`MAX_APP_ID_LENGTH`].
#[must_use]
pub fn extract_vendor_namespace(pairs: &[(String, String)], namespace: &str) -> Option<String> {
    let mut matches = pairs.iter().filter(|(k, _)| k == namespace);
    let (_, value) = matches.next()?;

    if matches.next().is_some() {
        debug!("tracestate carries `{namespace}` more than once, ignoring it");
        return None;
    }

    Some(truncate(value, MAX_APP_ID_LENGTH).to_string())
}

/// `true` for 32 lowercase hex digits that are not all zero.
#[must_use]
pub fn is_valid_trace_id(value: &str) -> bool {
    is_lower_hex(value, 32)
}

/// `true` for 16 lowercase hex digits that are not all zero.
#[must_use]
pub fn is_valid_span_id(value: &str) -> bool {
    is_lower_hex(value, 16)
}

fn is_lower_hex(value: &str, width: usize) -> bool {
    value.len() == width
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        && !INVALID_SEGMENT_REGEX.is_match(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_traceparent() {
        let tp = parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .expect("couldn't parse traceparent");

        assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(tp.parent_span_id, "00f067aa0ba902b7");
        assert!(tp.sampled);
    }

    #[test]
    fn test_parse_traceparent_not_sampled() {
        let tp =
            parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00").unwrap();
        assert!(!tp.sampled);
    }

    #[test]
    fn test_parse_traceparent_normalizes_case() {
        let tp =
            parse_traceparent("00-4BF92F3577B34DA6A3CE929D0E0E4736-00F067AA0BA902B7-01").unwrap();
        assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(tp.parent_span_id, "00f067aa0ba902b7");
    }

    #[test]
    fn test_parse_traceparent_rejects() {
        let cases = [
            // unknown version
            "01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            // all-zero ids
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            // wrong widths
            "00-4bf92f3577b34da6a3ce929d0e0e473-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-1",
            // garbage
            "invalid",
            "",
        ];

        for case in cases {
            assert!(parse_traceparent(case).is_err(), "accepted {case}");
        }
    }

    #[test]
    fn test_parse_traceparent_truncates_to_bound() {
        let tp = parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra")
            .unwrap();
        assert_eq!(tp.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(tp.parent_span_id, "00f067aa0ba902b7");
        assert!(tp.sampled);

        // the cut lands inside the flags
        assert!(parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-0").is_err());
        assert!(
            parse_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-000f067aa0ba902b7-01").is_err()
        );
    }

    #[test]
    fn test_format_traceparent() {
        assert_eq!(
            format_traceparent("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
        assert_eq!(
            format_traceparent("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", false),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00"
        );
    }

    #[test]
    fn test_parse_tracestate() {
        let pairs = parse_tracestate(&["az=cid-v1:abc, congo=t61rcWkgMzE"]);
        assert_eq!(
            pairs,
            vec![
                ("az".to_string(), "cid-v1:abc".to_string()),
                ("congo".to_string(), "t61rcWkgMzE".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_tracestate_multiple_lines() {
        let pairs = parse_tracestate(&["a=1", "b=2,c=3"]);
        assert_eq!(pairs.len(), 3);
        assert_eq!(format_tracestate(&pairs), "a=1,b=2,c=3");
    }

    #[test]
    fn test_parse_tracestate_skips_malformed() {
        let pairs = parse_tracestate(&["state=some,novalue,=x,UPPER=1,ok=é,, last=1"]);
        assert_eq!(
            pairs,
            vec![
                ("state".to_string(), "some".to_string()),
                ("last".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_tracestate_max_pairs() {
        let header = (0..40).map(|i| format!("k{i}=v{i}")).collect::<Vec<_>>().join(",");
        let pairs = parse_tracestate(&[&header]);
        assert_eq!(pairs.len(), MAX_TRACESTATE_PAIRS);
        assert_eq!(pairs[31], ("k31".to_string(), "v31".to_string()));
    }

    #[test]
    fn test_parse_tracestate_max_length_drops_cut_member() {
        let long_value = "x".repeat(MAX_TRACESTATE_LENGTH);
        let header = format!("a=1,b={long_value}");
        let pairs = parse_tracestate(&[&header]);
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_extract_vendor_namespace() {
        let pairs = parse_tracestate(&["congo=1,az=cid-v1:upstream"]);
        assert_eq!(
            extract_vendor_namespace(&pairs, "az"),
            Some("cid-v1:upstream".to_string())
        );
        assert_eq!(extract_vendor_namespace(&pairs, "dd"), None);
    }

    #[test]
    fn test_extract_vendor_namespace_ambiguous() {
        let pairs = parse_tracestate(&["az=cid-v1:one,az=cid-v1:two"]);
        assert_eq!(extract_vendor_namespace(&pairs, "az"), None);
    }

    #[test]
    fn test_extract_vendor_namespace_bounded() {
        let value = "a".repeat(80);
        let pairs = vec![("az".to_string(), value)];
        assert_eq!(
            extract_vendor_namespace(&pairs, "az").unwrap().len(),
            MAX_APP_ID_LENGTH
        );
    }

    #[test]
    fn test_is_valid_ids() {
        assert!(is_valid_trace_id("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert!(!is_valid_trace_id("4BF92F3577B34DA6A3CE929D0E0E4736"));
        assert!(!is_valid_trace_id("00000000000000000000000000000000"));
        assert!(!is_valid_trace_id("abc"));
        assert!(is_valid_span_id("00f067aa0ba902b7"));
        assert!(!is_valid_span_id("0000000000000000"));
        assert!(!is_valid_span_id("00f067aa0ba902bz"));
    }
}
