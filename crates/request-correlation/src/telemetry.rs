// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry records handed to a [`crate::sink::TelemetrySink`].

use std::{
    error::Error,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::Serialize;

use crate::context::OrderedMap;

/// SDK version stamped on every request record.
pub const SDK_VERSION: &str = concat!("rustcorr:", env!("CARGO_PKG_VERSION"));

/// Telemetry of one served request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    /// Hierarchical id of the request, `|<trace>.<span>.` for W3C requests.
    pub id: String,
    /// Trace id.
    pub operation_id: String,
    /// Id of the calling operation.
    pub operation_parent_id: Option<String>,
    /// `"<method> <path>"` unless a name was set before the request ended.
    pub name: Option<String>,
    pub url: String,
    /// Zero until the request ends.
    pub response_code: u16,
    pub success: bool,
    pub duration: Duration,
    /// Start of the request, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Application id of the caller, when it differs from ours.
    pub source: Option<String>,
    pub properties: OrderedMap,
    pub sdk_version: String,
}

impl RequestRecord {
    #[must_use]
    pub fn new(id: String, operation_id: String, url: String) -> Self {
        Self {
            id,
            operation_id,
            operation_parent_id: None,
            name: None,
            url,
            response_code: 0,
            success: true,
            duration: Duration::ZERO,
            timestamp: unix_millis(SystemTime::now()),
            source: None,
            properties: OrderedMap::new(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }
}

/// Where an exception was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExceptionSite {
    /// Raised by the hosting pipeline or a middleware around the handler.
    Platform,
    /// Reported by application code after handling it.
    UserCode,
    /// Escaped the request pipeline.
    Unhandled,
}

/// Telemetry of one exception.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    pub operation_id: Option<String>,
    /// Id of the request record the exception belongs to.
    pub operation_parent_id: Option<String>,
    pub message: String,
    /// Messages of the error's `source()` chain, outermost first.
    pub causes: Vec<String>,
    pub handled_at: ExceptionSite,
    pub timestamp: u64,
    pub properties: OrderedMap,
}

impl ExceptionRecord {
    /// Builds a record from an error, walking its source chain.
    #[must_use]
    pub fn from_error(error: &(dyn Error + 'static), handled_at: ExceptionSite) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            operation_id: None,
            operation_parent_id: None,
            message: error.to_string(),
            causes,
            handled_at,
            timestamp: unix_millis(SystemTime::now()),
            properties: OrderedMap::new(),
        }
    }
}

pub(crate) fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thiserror::Error;

    use super::*;

    #[derive(Error, Debug)]
    #[error("handler failed")]
    struct HandlerError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_exception_record_walks_sources() {
        let err = HandlerError {
            source: std::io::Error::other("connection reset"),
        };
        let record = ExceptionRecord::from_error(&err, ExceptionSite::UserCode);
        assert_eq!(record.message, "handler failed");
        assert_eq!(record.causes, vec!["connection reset".to_string()]);
        assert_eq!(record.handled_at, ExceptionSite::UserCode);
        assert!(record.operation_id.is_none());
    }

    #[test]
    fn test_request_record_defaults() {
        let record = RequestRecord::new("|a.b.".to_string(), "a".to_string(), "/".to_string());
        assert!(record.success);
        assert_eq!(record.response_code, 0);
        assert!(record.sdk_version.starts_with("rustcorr:"));
        assert!(record.timestamp > 0);
    }

    #[test]
    fn test_request_record_serializes_camel_case() {
        let mut record =
            RequestRecord::new("|a.b.".to_string(), "a".to_string(), "/".to_string());
        record.properties.insert("k", "v");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["operationId"], "a");
        assert_eq!(json["responseCode"], 0);
        assert_eq!(json["properties"]["k"], "v");
        assert!(json["operationParentId"].is_null());
    }
}
