// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;

use hyper::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use request_correlation::{
    config::Config,
    controller::{CorrelationController, IncomingRequest, RequestContext},
    sink::{ChannelSink, Telemetry},
    telemetry::{ExceptionRecord, RequestRecord},
};
use tokio::sync::mpsc::UnboundedReceiver;

pub const OWN_APP_ID: &str = "cid-v1:own";

/// Controller wired to a channel sink and a lookup resolving `ikey` to
/// [`OWN_APP_ID`].
pub fn controller(config: Config) -> (CorrelationController, UnboundedReceiver<Telemetry>) {
    let (sink, rx) = ChannelSink::new();
    let controller = CorrelationController::builder()
        .sink(Arc::new(sink))
        .app_id_lookup(Arc::new(|key: &str| {
            (key == "ikey").then(|| OWN_APP_ID.to_string())
        }))
        .config(Config {
            tenant_key: Some("ikey".to_string()),
            ..config
        })
        .build()
        .unwrap();
    (controller, rx)
}

pub fn header_map(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.append(*name, HeaderValue::from_str(value).unwrap());
    }
    headers
}

/// Runs a begin notification for `GET <path>` and returns the response headers.
pub fn begin(
    controller: &CorrelationController,
    ctx: &mut RequestContext,
    path: &str,
    headers: &HeaderMap,
) -> HeaderMap {
    let uri: Uri = path.parse().unwrap();
    let mut response_headers = HeaderMap::new();
    controller.on_begin_request(
        ctx,
        &IncomingRequest::new(&Method::GET, &uri, headers),
        &mut response_headers,
    );
    response_headers
}

pub fn end(controller: &CorrelationController, ctx: &mut RequestContext, status: u16) {
    controller.on_end_request(ctx, StatusCode::from_u16(status).unwrap());
}

/// Everything the sink received so far.
pub fn drain(rx: &mut UnboundedReceiver<Telemetry>) -> (Vec<RequestRecord>, Vec<ExceptionRecord>) {
    let mut requests = Vec::new();
    let mut exceptions = Vec::new();
    while let Ok(telemetry) = rx.try_recv() {
        match telemetry {
            Telemetry::Request(record) => requests.push(record),
            Telemetry::Exception(record) => exceptions.push(record),
        }
    }
    (requests, exceptions)
}
