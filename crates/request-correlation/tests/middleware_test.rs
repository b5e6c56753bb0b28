// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use common::helpers::{controller, drain, OWN_APP_ID};
use hyper::http::{Request, Response, StatusCode};
use request_correlation::{
    config::Config, telemetry::ExceptionSite, Activity, CorrelationLayer,
};
use tower::{service_fn, BoxError, Layer, ServiceExt};

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

fn request() -> Request<String> {
    Request::builder()
        .uri("/orders/42")
        .header("host", "shop.example")
        .header("traceparent", TRACEPARENT)
        .body(String::new())
        .unwrap()
}

#[tokio::test]
async fn test_middleware_records_request() {
    let (controller, mut rx) = controller(Config::default());
    let layer = CorrelationLayer::new(Arc::new(controller));

    let service = layer.layer(service_fn(|req: Request<String>| async move {
        let activity = req.extensions().get::<Activity>().cloned().unwrap();

        // Outbound propagation from the handler
        let mut outbound: HashMap<String, String> = HashMap::new();
        activity.inject(&mut outbound, true);
        let traceparent = outbound.remove("traceparent").unwrap_or_default();

        Ok::<_, Infallible>(Response::new(traceparent))
    }));

    let response = service.oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("request-context").unwrap(),
        format!("appId={OWN_APP_ID}").as_str()
    );

    let outbound_traceparent = response.body().clone();
    assert!(outbound_traceparent.starts_with("00-4bf92f3577b34da6a3ce929d0e0e4736-"));
    assert!(!outbound_traceparent.contains("00f067aa0ba902b7"));

    let (requests, exceptions) = drain(&mut rx);
    assert!(exceptions.is_empty());
    assert_eq!(requests.len(), 1);
    let record = &requests[0];
    assert_eq!(record.name.as_deref(), Some("GET /orders/42"));
    assert_eq!(record.url, "http://shop.example/orders/42");
    assert_eq!(record.response_code, 200);
    assert!(record.success);
    assert_eq!(
        record.operation_parent_id.as_deref(),
        Some("|4bf92f3577b34da6a3ce929d0e0e4736.00f067aa0ba902b7.")
    );
}

#[tokio::test]
async fn test_middleware_keeps_handler_app_id() {
    let (controller, _rx) = controller(Config::default());
    let layer = CorrelationLayer::new(Arc::new(controller));

    let service = layer.layer(service_fn(|_req: Request<String>| async move {
        let response = Response::builder()
            .header("request-context", "appId=cid-v1:handler")
            .body(String::new())
            .unwrap();
        Ok::<_, Infallible>(response)
    }));

    let response = service.oneshot(request()).await.unwrap();
    let values: Vec<_> = response.headers().get_all("request-context").iter().collect();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0], "appId=cid-v1:handler");
}

#[tokio::test]
async fn test_middleware_extends_handler_request_context() {
    let (controller, _rx) = controller(Config::default());
    let layer = CorrelationLayer::new(Arc::new(controller));

    let service = layer.layer(service_fn(|_req: Request<String>| async move {
        let response = Response::builder()
            .header("request-context", "roleName=web")
            .body(String::new())
            .unwrap();
        Ok::<_, Infallible>(response)
    }));

    let response = service.oneshot(request()).await.unwrap();
    assert_eq!(
        response.headers().get("request-context").unwrap(),
        format!("roleName=web,appId={OWN_APP_ID}").as_str()
    );
}

#[tokio::test]
async fn test_middleware_reports_service_error() {
    let (controller, mut rx) = controller(Config::default());
    let layer = CorrelationLayer::new(Arc::new(controller));

    let service = layer.layer(service_fn(|_req: Request<String>| async move {
        Err::<Response<String>, BoxError>("database unavailable".into())
    }));

    let error = service.oneshot(request()).await.unwrap_err();
    assert_eq!(error.to_string(), "database unavailable");

    let (requests, exceptions) = drain(&mut rx);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].message, "database unavailable");
    assert_eq!(exceptions[0].handled_at, ExceptionSite::Unhandled);

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].response_code, 500);
    assert!(!requests[0].success);
    assert_eq!(
        exceptions[0].operation_parent_id.as_deref(),
        Some(requests[0].id.as_str())
    );
}
