// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reconciles the correlation headers of an inbound request into one identity.
//!
//! # Precedence
//!
//! 1. W3C mode enabled and a valid `traceparent`: continue that trace.
//! 2. `Request-Id`: continue the legacy hierarchy.
//! 3. `x-ms-request-root-id` (+ `x-ms-request-id`): continue the vendor pair.
//! 4. Nothing usable: start a new trace.
//!
//! A malformed `traceparent` counts as absent and falls through to the legacy
//! headers. `Request-Id` beats the vendor pair when both are present.
//!
//! Baggage and the caller's application id are read in every branch.
//! [`resolve`] is a pure function of the headers and the random source it is
//! given.

use rand::Rng;
use tracing::debug;

use crate::{
    context::{generate_span_id, generate_trace_id, OrderedMap, TraceIdentity},
    headers::{
        baggage::parse_baggage,
        carrier::Extractor,
        legacy::{child_request_id, extract_request_id, extract_vendor_ids},
        non_empty,
        request_context::extract_request_context_value,
        w3c::{
            extract_vendor_namespace, format_tracestate, is_valid_trace_id, parse_traceparent,
            parse_tracestate,
        },
        CORRELATION_CONTEXT_HEADER, REQUEST_CONTEXT_SOURCE_KEY, TRACEPARENT_HEADER,
        TRACESTATE_HEADER, TRACESTATE_VENDOR_NAMESPACE,
    },
};

/// Record property holding a legacy root that is not a W3C trace id.
pub const LEGACY_ROOT_ID_PROPERTY: &str = "ai_legacyRootId";

/// Record property holding the raw inbound `Request-Id`.
pub const LEGACY_REQUEST_ID_PROPERTY: &str = "ai_legacyRequestId";

/// Which inbound headers the identity was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    TraceContext,
    RequestId,
    VendorHeaders,
    None,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    pub identity: TraceIdentity,
    /// Hierarchical id of this request, used as the request record id.
    pub request_id: String,
    /// Id of the calling operation, if any.
    pub parent_id: Option<String>,
    /// Properties derived from legacy headers.
    pub properties: OrderedMap,
    pub source: CorrelationSource,
}

/// Resolves the trace identity of a request from its headers.
///
/// Never fails: for any input, including no headers at all, the returned
/// identity has a valid, non-zero trace id and span id.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use rand::{rngs::StdRng, SeedableRng};
/// use request_correlation::resolver::resolve;
///
/// let headers = HashMap::from([(
///     "traceparent".to_string(),
///     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
/// )]);
/// let resolved = resolve(&headers, true, &mut StdRng::seed_from_u64(1));
///
/// assert_eq!(resolved.identity.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
/// assert_eq!(
///     resolved.parent_id.as_deref(),
///     Some("|4bf92f3577b34da6a3ce929d0e0e4736.00f067aa0ba902b7.")
/// );
/// ```
pub fn resolve<R: Rng + ?Sized>(
    headers: &dyn Extractor,
    w3c_enabled: bool,
    rng: &mut R,
) -> ResolvedContext {
    let mut resolved = w3c_enabled
        .then(|| resolve_trace_context(headers, rng))
        .flatten()
        .or_else(|| resolve_request_id(headers, rng))
        .or_else(|| resolve_vendor_headers(headers, rng))
        .unwrap_or_else(|| resolve_new_root(rng));

    resolved.identity.baggage = parse_baggage(&headers.get_all(CORRELATION_CONTEXT_HEADER));

    if let Some(app_id) = extract_request_context_value(headers, REQUEST_CONTEXT_SOURCE_KEY) {
        resolved.identity.source_app_id = Some(app_id);
    }

    debug!(
        "Resolved trace {} from {:?}",
        resolved.identity.trace_id, resolved.source
    );
    resolved
}

fn resolve_trace_context<R: Rng + ?Sized>(
    headers: &dyn Extractor,
    rng: &mut R,
) -> Option<ResolvedContext> {
    let value = non_empty(headers.get(TRACEPARENT_HEADER))?;
    let traceparent = match parse_traceparent(value) {
        Ok(traceparent) => traceparent,
        Err(e) => {
            debug!("{e}");
            return None;
        }
    };

    let pairs = parse_tracestate(&headers.get_all(TRACESTATE_HEADER));
    let source_app_id = extract_vendor_namespace(&pairs, TRACESTATE_VENDOR_NAMESPACE);

    let identity = TraceIdentity {
        trace_id: traceparent.trace_id,
        span_id: generate_span_id(rng),
        parent_span_id: Some(traceparent.parent_span_id),
        sampled: traceparent.sampled,
        trace_state: (!pairs.is_empty()).then(|| format_tracestate(&pairs)),
        source_app_id,
        ..Default::default()
    };

    let parent_id = identity
        .parent_span_id
        .as_ref()
        .map(|parent| format!("|{}.{parent}.", identity.trace_id));

    Some(ResolvedContext {
        request_id: identity.hierarchical_id(),
        parent_id,
        identity,
        properties: OrderedMap::new(),
        source: CorrelationSource::TraceContext,
    })
}

fn resolve_request_id<R: Rng + ?Sized>(
    headers: &dyn Extractor,
    rng: &mut R,
) -> Option<ResolvedContext> {
    let request_id = extract_request_id(headers)?;

    let mut properties = OrderedMap::new();
    let root = request_id.root.as_deref().unwrap_or(&request_id.full);
    let trace_id = legacy_trace_id(root, &mut properties, rng);
    properties.insert_if_absent(LEGACY_REQUEST_ID_PROPERTY, request_id.full.as_str());

    let identity = legacy_identity(trace_id, rng);

    Some(ResolvedContext {
        request_id: child_request_id(&request_id.full, &identity.span_id),
        parent_id: Some(request_id.full),
        identity,
        properties,
        source: CorrelationSource::RequestId,
    })
}

fn resolve_vendor_headers<R: Rng + ?Sized>(
    headers: &dyn Extractor,
    rng: &mut R,
) -> Option<ResolvedContext> {
    let ids = extract_vendor_ids(headers)?;

    let mut properties = OrderedMap::new();
    let trace_id = legacy_trace_id(&ids.root_id, &mut properties, rng);
    let identity = legacy_identity(trace_id, rng);

    Some(ResolvedContext {
        request_id: child_request_id(&ids.root_id, &identity.span_id),
        parent_id: ids.parent_id,
        identity,
        properties,
        source: CorrelationSource::VendorHeaders,
    })
}

fn resolve_new_root<R: Rng + ?Sized>(rng: &mut R) -> ResolvedContext {
    let identity = TraceIdentity::new_root(rng);
    ResolvedContext {
        request_id: identity.hierarchical_id(),
        parent_id: None,
        identity,
        properties: OrderedMap::new(),
        source: CorrelationSource::None,
    }
}

/// A legacy root is kept as the trace id only when it is one already.
/// Anything else gets a fresh trace id and is preserved as a property.
fn legacy_trace_id<R: Rng + ?Sized>(
    root: &str,
    properties: &mut OrderedMap,
    rng: &mut R,
) -> String {
    let root_lower = root.to_ascii_lowercase();
    if is_valid_trace_id(&root_lower) {
        return root_lower;
    }

    debug!("Legacy root {root} is not a W3C trace id, generating one");
    properties.insert_if_absent(LEGACY_ROOT_ID_PROPERTY, root);
    generate_trace_id(rng)
}

fn legacy_identity<R: Rng + ?Sized>(trace_id: String, rng: &mut R) -> TraceIdentity {
    TraceIdentity {
        trace_id,
        span_id: generate_span_id(rng),
        sampled: true,
        ..Default::default()
    }
}
