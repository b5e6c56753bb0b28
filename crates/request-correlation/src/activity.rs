// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-flight operation of a request.
//!
//! An [`Activity`] is passed explicitly through the processing of one request.
//! It is either synthesized by the controller from the resolved headers, or
//! supplied by the host when it already started one; only synthesized
//! activities are stopped by the controller.

use std::time::{Duration, Instant, SystemTime};

use crate::{
    context::TraceIdentity,
    headers::{
        baggage::format_baggage,
        carrier::Injector,
        w3c::format_traceparent,
        CORRELATION_CONTEXT_HEADER, REQUEST_ID_HEADER, TRACEPARENT_HEADER, TRACESTATE_HEADER,
    },
    resolver::ResolvedContext,
};

#[derive(Debug, Clone)]
pub struct Activity {
    operation_name: String,
    identity: TraceIdentity,
    request_id: String,
    parent_id: Option<String>,
    started_at: SystemTime,
    started: Instant,
    duration: Option<Duration>,
    synthesized: bool,
}

impl Activity {
    /// Starts an activity supplied by the host.
    ///
    /// `request_id` is the hierarchical id of this operation and `parent_id` the
    /// id of its caller.
    #[must_use]
    pub fn new(
        operation_name: impl Into<String>,
        identity: TraceIdentity,
        request_id: String,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            identity,
            request_id,
            parent_id,
            started_at: SystemTime::now(),
            started: Instant::now(),
            duration: None,
            synthesized: false,
        }
    }

    /// Starts an activity for a resolved request. Marked as synthesized.
    #[must_use]
    pub fn synthesize(operation_name: impl Into<String>, resolved: &ResolvedContext) -> Self {
        let mut activity = Self::new(
            operation_name,
            resolved.identity.clone(),
            resolved.request_id.clone(),
            resolved.parent_id.clone(),
        );
        activity.synthesized = true;
        activity
    }

    /// Stops the activity and returns its duration.
    ///
    /// Only the first call records the duration; later calls return it again.
    pub fn stop(&mut self) -> Duration {
        *self.duration.get_or_insert_with(|| self.started.elapsed())
    }

    /// Time since start, or the recorded duration once stopped.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.duration.unwrap_or_else(|| self.started.elapsed())
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.duration.is_some()
    }

    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    #[must_use]
    pub fn identity(&self) -> &TraceIdentity {
        &self.identity
    }

    pub(crate) fn identity_mut(&mut self) -> &mut TraceIdentity {
        &mut self.identity
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    #[must_use]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Writes this activity's context to an outbound carrier.
    ///
    /// `traceparent` and `tracestate` are written in W3C mode only. `Request-Id`
    /// is always written, `Correlation-Context` when there is baggage.
    pub fn inject(&self, carrier: &mut dyn Injector, w3c_enabled: bool) {
        if w3c_enabled {
            carrier.set(
                TRACEPARENT_HEADER,
                format_traceparent(
                    &self.identity.trace_id,
                    &self.identity.span_id,
                    self.identity.sampled,
                ),
            );
            if let Some(trace_state) = &self.identity.trace_state {
                carrier.set(TRACESTATE_HEADER, trace_state.clone());
            }
        }

        carrier.set(REQUEST_ID_HEADER, self.request_id.clone());

        if let Some(baggage) = format_baggage(&self.identity.baggage) {
            carrier.set(CORRELATION_CONTEXT_HEADER, baggage);
        }
    }
}
