// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tower` middleware binding a [`CorrelationController`] to an HTTP service.
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .layer(CorrelationLayer::new(Arc::new(controller)))
//!     .service(handler);
//! ```
//!
//! Inner services find the request's [`Activity`] in the request extensions
//! and can use [`Activity::inject`] to propagate it on outbound calls.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use hyper::http::{HeaderMap, Request, Response, StatusCode};
use tower::{BoxError, Layer, Service};

use crate::{
    activity::Activity,
    controller::{CorrelationController, IncomingRequest, RequestContext},
    headers::{
        request_context::{extract_request_context_value, set_response_context},
        REQUEST_CONTEXT_TARGET_KEY,
    },
    telemetry::ExceptionSite,
};

#[derive(Clone)]
pub struct CorrelationLayer {
    controller: Arc<CorrelationController>,
}

impl CorrelationLayer {
    #[must_use]
    pub fn new(controller: Arc<CorrelationController>) -> Self {
        Self { controller }
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            controller: Arc::clone(&self.controller),
        }
    }
}

#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    controller: Arc<CorrelationController>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ResBody: 'static,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let controller = Arc::clone(&self.controller);
        let mut ctx = RequestContext::new();
        let mut staged = HeaderMap::new();

        controller.on_begin_request(
            &mut ctx,
            &IncomingRequest::from_request(&request),
            &mut staged,
        );
        if let Some(activity) = ctx.activity() {
            request.extensions_mut().insert::<Activity>(activity.clone());
        }

        let future = self.inner.call(request);

        Box::pin(async move {
            match future.await {
                Ok(mut response) => {
                    if let Some(app_id) =
                        extract_request_context_value(&staged, REQUEST_CONTEXT_TARGET_KEY)
                    {
                        set_response_context(response.headers_mut(), &app_id);
                    }
                    controller.on_end_request(&mut ctx, response.status());
                    Ok(response)
                }
                Err(e) => {
                    let error: BoxError = e.into();
                    controller.on_exception(&mut ctx, &*error, ExceptionSite::Unhandled);
                    controller.on_end_request(&mut ctx, StatusCode::INTERNAL_SERVER_ERROR);
                    Err(error)
                }
            }
        })
    }
}
