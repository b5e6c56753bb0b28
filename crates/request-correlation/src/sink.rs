// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collaborators of the controller: where records go and how application ids
//! are looked up.

use std::{collections::HashMap, sync::RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use crate::telemetry::{ExceptionRecord, RequestRecord};

/// Receives finished telemetry records.
///
/// Implementations must not block: records are handed over on the request path.
pub trait TelemetrySink: Send + Sync {
    /// `false` when the sink currently drops everything. Checked before any
    /// header is parsed.
    fn is_enabled(&self) -> bool {
        true
    }

    fn accept_request(&self, record: RequestRecord);

    fn accept_exception(&self, record: ExceptionRecord);
}

/// Record sent through a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Request(RequestRecord),
    Exception(ExceptionRecord),
}

/// Sink forwarding records to a tokio channel.
///
/// Disabled once the receiving half is dropped.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Telemetry>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Telemetry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, telemetry: Telemetry) {
        if let Err(e) = self.tx.send(telemetry) {
            debug!("Failed to send telemetry, receiver is gone: {e}");
        }
    }
}

impl TelemetrySink for ChannelSink {
    fn is_enabled(&self) -> bool {
        !self.tx.is_closed()
    }

    fn accept_request(&self, record: RequestRecord) {
        self.send(Telemetry::Request(record));
    }

    fn accept_exception(&self, record: ExceptionRecord) {
        self.send(Telemetry::Exception(record));
    }
}

/// Resolves a tenant key to the application id announced in `Request-Context`.
pub trait AppIdLookup: Send + Sync {
    /// `None` when the id is unknown or cannot be fetched right now.
    fn try_resolve(&self, tenant_key: &str) -> Option<String>;
}

impl<F> AppIdLookup for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn try_resolve(&self, tenant_key: &str) -> Option<String> {
        self(tenant_key)
    }
}

/// Memoizes successful lookups of an inner [`AppIdLookup`].
///
/// Failures are not cached, so a lookup that is not ready yet is retried on the
/// next request.
pub struct CachingAppIdLookup<L> {
    inner: L,
    cache: RwLock<HashMap<String, String>>,
}

impl<L: AppIdLookup> CachingAppIdLookup<L> {
    #[must_use]
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl<L: AppIdLookup> AppIdLookup for CachingAppIdLookup<L> {
    fn try_resolve(&self, tenant_key: &str) -> Option<String> {
        if let Some(app_id) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(tenant_key).cloned())
        {
            return Some(app_id);
        }

        let app_id = self.inner.try_resolve(tenant_key)?;
        match self.cache.write() {
            Ok(mut cache) => {
                cache.insert(tenant_key.to_string(), app_id.clone());
            }
            Err(_) => debug!("App id cache is poisoned, not caching {tenant_key}"),
        }
        Some(app_id)
    }
}
