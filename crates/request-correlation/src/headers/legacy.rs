// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Legacy hierarchical request ids and the vendor root/parent header pair.
//!
//! A hierarchical id starts with `|`, its first dot-delimited segment is the
//! root (the operation id shared by every hop), and every hop appends a
//! segment of its own:
//!
//! ```text
//! Request-Id: |4bf92f3577b34da6a3ce929d0e0e4736.a1b2c3d4_
//!              └──────────── root ─────────────┘
//! ```
//!
//! Ids without a leading `|` are irregular: they are kept verbatim but have no
//! root.

use tracing::debug;

use crate::headers::{
    carrier::Extractor, non_empty, truncate, MAX_HEADER_VALUE_LENGTH, PARENT_ID_HEADER,
    REQUEST_ID_HEADER, ROOT_ID_HEADER,
};

/// Parsed `Request-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRequestId {
    /// The header value, cut to [`MAX_HEADER_VALUE_LENGTH`].
    pub full: String,
    /// First segment after the leading `|`. `None` for irregular ids.
    pub root: Option<String>,
}

/// Parses a `Request-Id` header value.
///
/// Returns `None` for an empty value.
///
/// # Example
///
/// ```
/// use request_correlation::headers::legacy::parse_legacy_request_id;
///
/// let id = parse_legacy_request_id("|abc.1.2.").unwrap();
/// assert_eq!(id.root.as_deref(), Some("abc"));
///
/// let irregular = parse_legacy_request_id("abc.1").unwrap();
/// assert_eq!(irregular.root, None);
/// ```
#[must_use]
pub fn parse_legacy_request_id(value: &str) -> Option<LegacyRequestId> {
    let full = truncate(non_empty(Some(value))?, MAX_HEADER_VALUE_LENGTH);

    let root = full.strip_prefix('|').and_then(|rest| {
        let end = rest.find('.').unwrap_or(rest.len());
        let root = &rest[..end];
        (!root.is_empty()).then(|| root.to_string())
    });

    Some(LegacyRequestId {
        full: full.to_string(),
        root,
    })
}

/// Vendor root/parent header pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorIds {
    /// Operation id of the caller.
    pub root_id: String,
    /// Id of the calling operation, if sent.
    pub parent_id: Option<String>,
}

/// Reads the `Request-Id` header from a carrier.
#[must_use]
pub fn extract_request_id(carrier: &dyn Extractor) -> Option<LegacyRequestId> {
    parse_legacy_request_id(non_empty(carrier.get(REQUEST_ID_HEADER))?)
}

/// Reads the vendor root/parent pair. Absent without a root id.
#[must_use]
pub fn extract_vendor_ids(carrier: &dyn Extractor) -> Option<VendorIds> {
    let root_id = non_empty(carrier.get(ROOT_ID_HEADER))?;
    let parent_id = non_empty(carrier.get(PARENT_ID_HEADER))
        .map(|p| truncate(p, MAX_HEADER_VALUE_LENGTH).to_string());

    Some(VendorIds {
        root_id: truncate(root_id, MAX_HEADER_VALUE_LENGTH).to_string(),
        parent_id,
    })
}

/// Builds the hierarchical id of a child operation.
///
/// The parent is normalized to start with `|` and to end with a segment
/// delimiter (`.` or `_`), then `suffix` and `_` are appended. When the result
/// would exceed [`MAX_HEADER_VALUE_LENGTH`], the parent is trimmed back to a
/// delimiter and the id is terminated with `#` instead.
///
/// # Example
///
/// ```
/// use request_correlation::headers::legacy::child_request_id;
///
/// assert_eq!(child_request_id("|abc.1.", "a1b2"), "|abc.1.a1b2_");
/// assert_eq!(child_request_id("abc", "a1b2"), "|abc.a1b2_");
/// ```
#[must_use]
pub fn child_request_id(parent: &str, suffix: &str) -> String {
    let mut base = String::with_capacity(parent.len() + suffix.len() + 3);
    if !parent.starts_with('|') {
        base.push('|');
    }
    base.push_str(parent);
    if !base.ends_with('.') && !base.ends_with('_') {
        base.push('.');
    }

    if base.len() + suffix.len() < MAX_HEADER_VALUE_LENGTH {
        base.push_str(suffix);
        base.push('_');
        return base;
    }

    debug!("Request-Id too long, trimming it to fit a child segment");

    // Room for the suffix and the overflow marker
    let keep = MAX_HEADER_VALUE_LENGTH.saturating_sub(suffix.len() + 1);
    let trimmed = truncate(&base, keep);
    let trimmed = trimmed
        .rfind(&['.', '_', '#'][..])
        .map_or(trimmed, |i| &trimmed[..=i]);

    format!("{trimmed}{suffix}#")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_parse_hierarchical() {
        let id = parse_legacy_request_id("|4bf92f3577b34da6a3ce929d0e0e4736.1.").unwrap();
        assert_eq!(id.full, "|4bf92f3577b34da6a3ce929d0e0e4736.1.");
        assert_eq!(
            id.root.as_deref(),
            Some("4bf92f3577b34da6a3ce929d0e0e4736")
        );
    }

    #[test]
    fn test_parse_root_only() {
        let id = parse_legacy_request_id("|root").unwrap();
        assert_eq!(id.root.as_deref(), Some("root"));
    }

    #[test]
    fn test_parse_irregular() {
        let id = parse_legacy_request_id("some-guid").unwrap();
        assert_eq!(id.full, "some-guid");
        assert_eq!(id.root, None);

        let id = parse_legacy_request_id("|.1.").unwrap();
        assert_eq!(id.root, None);
    }

    #[test]
    fn test_parse_empty_is_absent() {
        assert_eq!(parse_legacy_request_id(""), None);
        assert_eq!(parse_legacy_request_id("  "), None);
    }

    #[test]
    fn test_parse_truncates_to_bound() {
        let long = format!("|root.{}", "a".repeat(2000));
        let id = parse_legacy_request_id(&long).unwrap();
        assert_eq!(id.full.len(), MAX_HEADER_VALUE_LENGTH);
        assert_eq!(id.root.as_deref(), Some("root"));
    }

    #[test]
    fn test_extract_vendor_ids_truncates_to_bound() {
        let root = format!("{}{}", "b".repeat(32), "c".repeat(2000));
        let parent = format!("|{}.{}", "b".repeat(32), "d".repeat(2000));
        let headers = HashMap::from([
            ("x-ms-request-root-id".to_string(), root.clone()),
            ("x-ms-request-id".to_string(), parent.clone()),
        ]);

        let ids = extract_vendor_ids(&headers).unwrap();
        assert_eq!(ids.root_id.len(), MAX_HEADER_VALUE_LENGTH);
        assert!(root.starts_with(&ids.root_id));
        let parent_id = ids.parent_id.unwrap();
        assert_eq!(parent_id.len(), MAX_HEADER_VALUE_LENGTH);
        assert!(parent.starts_with(&parent_id));
    }

    #[test]
    fn test_extract_vendor_ids() {
        let headers = HashMap::from([
            ("x-ms-request-root-id".to_string(), "root".to_string()),
            ("x-ms-request-id".to_string(), "|root.parent.".to_string()),
        ]);
        let ids = extract_vendor_ids(&headers).unwrap();
        assert_eq!(ids.root_id, "root");
        assert_eq!(ids.parent_id.as_deref(), Some("|root.parent."));
    }

    #[test]
    fn test_extract_vendor_ids_requires_root() {
        let headers = HashMap::from([("x-ms-request-id".to_string(), "parent".to_string())]);
        assert_eq!(extract_vendor_ids(&headers), None);

        let headers = HashMap::from([("x-ms-request-root-id".to_string(), String::new())]);
        assert_eq!(extract_vendor_ids(&headers), None);
    }

    #[test]
    fn test_child_request_id() {
        assert_eq!(child_request_id("|a.b.", "c"), "|a.b.c_");
        assert_eq!(child_request_id("|a.b_", "c"), "|a.b_c_");
        assert_eq!(child_request_id("|a", "c"), "|a.c_");
        assert_eq!(child_request_id("a", "c"), "|a.c_");
    }

    #[test]
    fn test_child_request_id_overflow() {
        let parent = format!("|root.{}.", "x".repeat(1100));
        let child = child_request_id(&parent, "0123456789abcdef");
        assert!(child.len() <= MAX_HEADER_VALUE_LENGTH);
        assert!(child.starts_with("|root."));
        assert!(child.ends_with("0123456789abcdef#"));
    }
}
