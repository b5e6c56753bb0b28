// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Distributed trace-context correlation for HTTP request pipelines.
//!
//! Inbound requests may carry their caller's identity in W3C Trace Context
//! headers, in a legacy hierarchical `Request-Id`, or in a vendor root/parent
//! header pair. This crate reconciles them into one trace identity per request
//! and produces one request record per request, plus one exception record per
//! reported error, for a telemetry sink.
//!
//! - [`headers`]: header codec (parsing, formatting, carriers, bounds)
//! - [`resolver`]: precedence rules turning headers into a [`context::TraceIdentity`]
//! - [`controller`]: per-request lifecycle state machine
//! - [`middleware`]: `tower` layer driving the controller
//! - [`registry`]: selects the one active listener of a process
//! - [`sink`]: telemetry sink and app id lookup collaborators
//!
//! Correlation never fails a request: malformed headers are treated as absent
//! and no operation on the request path returns an error.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(clippy::all)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]

pub mod activity;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod headers;
pub mod logger;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod telemetry;

pub use activity::Activity;
pub use config::Config;
pub use controller::{CorrelationController, IncomingRequest, RequestContext};
pub use error::CorrelationError;
pub use middleware::CorrelationLayer;
pub use sink::{AppIdLookup, ChannelSink, TelemetrySink};
