// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request correlation controller.
//!
//! The controller is shared by every request of a pipeline. Per-request state
//! lives in a [`RequestContext`] owned by the request itself and moves through
//! three states:
//!
//! ```text
//! Idle ──begin──▶ Started ──end──▶ Ended
//!                    │
//!                exception (any number of times, sets `exception_seen`)
//! ```
//!
//! A second begin, an end without a begin and an end after the end are all
//! no-ops, so hosts that deliver the same lifecycle event through more than one
//! event family produce exactly one record per request.

use std::{error::Error, sync::Arc};

use hyper::http::{HeaderMap, Method, Request, StatusCode, Uri};
use tracing::{debug, warn};

use crate::{
    activity::Activity,
    config::Config,
    context::OrderedMap,
    error::CorrelationError,
    headers::{carrier::Extractor, non_empty, request_context::set_response_context},
    registry::{ListenerId, ListenerRegistry},
    resolver::resolve,
    sink::{AppIdLookup, TelemetrySink},
    telemetry::{unix_millis, ExceptionRecord, ExceptionSite, RequestRecord},
};

/// Lifecycle state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Started,
    Ended,
}

/// The parts of an inbound request the controller reads.
#[derive(Clone, Copy)]
pub struct IncomingRequest<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a dyn Extractor,
}

impl<'a> IncomingRequest<'a> {
    #[must_use]
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a dyn Extractor) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    #[must_use]
    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }

    /// `"<method> <path>"`.
    #[must_use]
    pub fn default_name(&self) -> String {
        format!("{} {}", self.method, self.uri.path())
    }

    /// Absolute URL of the request. Relative request targets are completed
    /// with the `Host` header.
    #[must_use]
    pub fn url(&self) -> String {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            return self.uri.to_string();
        }

        let path_and_query = self
            .uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str());

        match non_empty(self.headers.get("host")) {
            Some(host) => format!("http://{host}{path_and_query}"),
            None => path_and_query.to_string(),
        }
    }
}

/// Correlation state of one request.
#[derive(Debug, Default)]
pub struct RequestContext {
    state: RequestState,
    activity: Option<Activity>,
    record: Option<RequestRecord>,
    name: Option<String>,
    default_name: String,
    properties: OrderedMap,
    exception_seen: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues an activity the host already started instead of synthesizing
    /// one. The controller never stops it.
    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Caller properties. They win over baggage and legacy properties.
    #[must_use]
    pub fn with_properties(mut self, properties: OrderedMap) -> Self {
        self.properties = properties;
        self
    }

    /// Sets a property on the record, or stages it if the request has not
    /// started yet.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        match self.record.as_mut() {
            Some(record) => record.properties.insert(key, value),
            None => self.properties.insert(key, value),
        }
    }

    /// Names the request. Takes precedence over `"<method> <path>"`.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    #[must_use]
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    /// Record under construction, between start and end.
    #[must_use]
    pub fn record(&self) -> Option<&RequestRecord> {
        self.record.as_ref()
    }

    pub fn record_mut(&mut self) -> Option<&mut RequestRecord> {
        self.record.as_mut()
    }

    #[must_use]
    pub fn exception_seen(&self) -> bool {
        self.exception_seen
    }
}

/// Builds a [`CorrelationController`].
#[derive(Default)]
pub struct CorrelationControllerBuilder {
    sink: Option<Arc<dyn TelemetrySink>>,
    app_id_lookup: Option<Arc<dyn AppIdLookup>>,
    registry: Option<Arc<ListenerRegistry>>,
    config: Config,
}

impl CorrelationControllerBuilder {
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn app_id_lookup(mut self, lookup: Arc<dyn AppIdLookup>) -> Self {
        self.app_id_lookup = Some(lookup);
        self
    }

    /// Registry shared with the other pipelines of the process. Without one the
    /// controller gets a registry of its own and is always active.
    #[must_use]
    pub fn registry(mut self, registry: Arc<ListenerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validates the wiring and attaches the controller to its registry.
    pub fn build(self) -> Result<CorrelationController, CorrelationError> {
        let sink = self.sink.ok_or(CorrelationError::MissingSink)?;
        self.config.validate()?;

        if self.config.inject_response_headers
            && (self.config.tenant_key.is_none() || self.app_id_lookup.is_none())
        {
            debug!("No tenant key or app id lookup, Request-Context will not be sent");
        }

        let registry = self.registry.unwrap_or_default();
        let listener_id = registry.attach();

        Ok(CorrelationController {
            sink,
            app_id_lookup: self.app_id_lookup,
            registry,
            listener_id,
            config: self.config,
        })
    }
}

/// Drives request correlation for one pipeline.
///
/// Detaches from its registry when dropped.
pub struct CorrelationController {
    sink: Arc<dyn TelemetrySink>,
    app_id_lookup: Option<Arc<dyn AppIdLookup>>,
    registry: Arc<ListenerRegistry>,
    listener_id: ListenerId,
    config: Config,
}

impl CorrelationController {
    #[must_use]
    pub fn builder() -> CorrelationControllerBuilder {
        CorrelationControllerBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.is_active(self.listener_id)
    }

    /// Our own application id, when a tenant key is configured and resolves.
    #[must_use]
    pub fn own_app_id(&self) -> Option<String> {
        let tenant_key = self.config.tenant_key.as_deref()?;
        self.app_id_lookup.as_ref()?.try_resolve(tenant_key)
    }

    /// Starts correlating a request.
    ///
    /// Resolves the identity from the request headers, continues or
    /// synthesizes the activity, builds the request record and announces our
    /// application id in `response_headers`.
    pub fn on_begin_request(
        &self,
        ctx: &mut RequestContext,
        request: &IncomingRequest<'_>,
        response_headers: &mut HeaderMap,
    ) {
        if !self.sink.is_enabled() {
            debug!("Telemetry sink is disabled, not tracking request");
            return;
        }
        if !self.config.request_tracking_enabled {
            return;
        }
        if !self.is_active() {
            debug!("Listener is not active, ignoring request start");
            return;
        }
        if ctx.state != RequestState::Idle {
            debug!("Request already started, ignoring duplicate start");
            return;
        }

        let resolved = resolve(request.headers, self.config.w3c_enabled, &mut rand::rng());
        let default_name = request.default_name();

        let activity = match ctx.activity.take() {
            Some(mut inherited) => {
                let identity = inherited.identity_mut();
                identity.baggage.merge_absent(&resolved.identity.baggage);
                if identity.source_app_id.is_none() {
                    identity.source_app_id = resolved.identity.source_app_id.clone();
                }
                inherited
            }
            None => Activity::synthesize(default_name.as_str(), &resolved),
        };

        let identity = activity.identity();
        let mut record = RequestRecord::new(
            activity.request_id().to_string(),
            identity.trace_id.clone(),
            request.url(),
        );
        record.operation_parent_id = activity.parent_id().map(str::to_string);
        record.timestamp = unix_millis(activity.started_at());

        record.properties = ctx.properties.clone();
        record.properties.merge_absent(&identity.baggage);
        if activity.is_synthesized() {
            record.properties.merge_absent(&resolved.properties);
        }

        let own_app_id = self.own_app_id();
        if let Some(source) = &identity.source_app_id {
            if own_app_id.as_ref() != Some(source) {
                record.source = Some(source.clone());
            }
        }

        if self.config.inject_response_headers {
            if let Some(app_id) = &own_app_id {
                if !set_response_context(response_headers, app_id) {
                    debug!("Response already declares an appId, not overriding it");
                }
            }
        }

        ctx.default_name = default_name;
        ctx.activity = Some(activity);
        ctx.record = Some(record);
        ctx.state = RequestState::Started;
    }

    /// Finishes a request and hands its record to the sink.
    pub fn on_end_request(&self, ctx: &mut RequestContext, status: StatusCode) {
        if !self.is_active() {
            debug!("Listener is not active, ignoring request end");
            return;
        }

        let Some(mut record) = ctx.record.take() else {
            debug!("Request ended without being started, ignoring");
            return;
        };
        ctx.state = RequestState::Ended;

        record.duration = match ctx.activity.as_mut() {
            Some(activity) if activity.is_synthesized() => activity.stop(),
            Some(activity) => activity.elapsed(),
            None => record.duration,
        };
        record.response_code = status.as_u16();
        if record.name.is_none() {
            record.name = Some(
                ctx.name
                    .clone()
                    .unwrap_or_else(|| ctx.default_name.clone()),
            );
        }
        record.success = status.as_u16() < 400 && !ctx.exception_seen;

        self.sink.accept_request(record);
    }

    /// Reports an exception raised while serving a request.
    ///
    /// May be called any number of times. The request is marked failed even
    /// when exception tracking is disabled.
    pub fn on_exception(
        &self,
        ctx: &mut RequestContext,
        error: &(dyn Error + 'static),
        handled_at: ExceptionSite,
    ) {
        if !self.is_active() {
            debug!("Listener is not active, ignoring exception");
            return;
        }

        ctx.exception_seen = true;
        if let Some(record) = ctx.record.as_mut() {
            record.success = false;
        }

        if !self.config.track_exceptions {
            return;
        }
        if !self.sink.is_enabled() {
            warn!("Telemetry sink is disabled, dropping exception: {error}");
            return;
        }

        let mut exception = ExceptionRecord::from_error(error, handled_at);
        if let Some(record) = ctx.record.as_ref() {
            exception.operation_id = Some(record.operation_id.clone());
            exception.operation_parent_id = Some(record.id.clone());
            exception.properties = record.properties.clone();
        } else if let Some(activity) = ctx.activity.as_ref() {
            // record already emitted, the activity still names the operation
            exception.operation_id = Some(activity.identity().trace_id.clone());
            exception.operation_parent_id = Some(activity.request_id().to_string());
        }

        self.sink.accept_exception(exception);
    }
}

impl Drop for CorrelationController {
    fn drop(&mut self) {
        self.registry.detach(self.listener_id);
    }
}
