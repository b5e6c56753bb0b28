// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the correlation layer.
//!
//! | Field | Environment variable | Default |
//! |---|---|---|
//! | `w3c_enabled` | `CORRELATION_W3C_ENABLED` | `true` |
//! | `request_tracking_enabled` | `CORRELATION_REQUEST_TRACKING_ENABLED` | `true` |
//! | `inject_response_headers` | `CORRELATION_INJECT_RESPONSE_HEADERS` | `true` |
//! | `track_exceptions` | `CORRELATION_TRACK_EXCEPTIONS` | `true` |
//! | `tenant_key` | `CORRELATION_TENANT_KEY` | none |
//! | `log_level` | `CORRELATION_LOG_LEVEL` | `warn` |
//!
//! Booleans accept `true`/`false` in any case as well as `1`/`0`.

pub mod log_level;

use std::{env, str::FromStr};

use serde::{Deserialize, Deserializer};
use serde_aux::prelude::deserialize_bool_from_anything;
use serde_json::Value;
use tracing::error;

use crate::{config::log_level::LogLevel, error::CorrelationError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Read and write W3C `traceparent`/`tracestate`.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub w3c_enabled: bool,
    /// Produce request records at all.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub request_tracking_enabled: bool,
    /// Announce our application id in the response `Request-Context` header.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub inject_response_headers: bool,
    /// Produce exception records.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub track_exceptions: bool,
    /// Key resolved to our own application id through the app id lookup.
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub tenant_key: Option<String>,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            w3c_enabled: true,
            request_tracking_enabled: true,
            inject_response_headers: true,
            track_exceptions: true,
            tenant_key: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Builds the configuration from `CORRELATION_*` environment variables.
    ///
    /// Unset variables keep their default.
    pub fn from_env() -> Result<Self, CorrelationError> {
        let defaults = Self::default();

        let w3c_enabled = env_bool("CORRELATION_W3C_ENABLED", defaults.w3c_enabled)?;
        let request_tracking_enabled = env_bool(
            "CORRELATION_REQUEST_TRACKING_ENABLED",
            defaults.request_tracking_enabled,
        )?;
        let inject_response_headers = env_bool(
            "CORRELATION_INJECT_RESPONSE_HEADERS",
            defaults.inject_response_headers,
        )?;
        let track_exceptions =
            env_bool("CORRELATION_TRACK_EXCEPTIONS", defaults.track_exceptions)?;
        let tenant_key = env::var("CORRELATION_TENANT_KEY").ok();
        let log_level = match env::var("CORRELATION_LOG_LEVEL") {
            Ok(val) => LogLevel::from_str(&val).map_err(CorrelationError::InvalidConfig)?,
            Err(_) => defaults.log_level,
        };

        let config = Self {
            w3c_enabled,
            request_tracking_enabled,
            inject_response_headers,
            track_exceptions,
            tenant_key,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CorrelationError> {
        if let Some(tenant_key) = &self.tenant_key {
            if tenant_key.trim().is_empty() {
                return Err(CorrelationError::InvalidConfig(
                    "CORRELATION_TENANT_KEY cannot be empty".to_string(),
                ));
            }
            if tenant_key.chars().any(char::is_control) {
                return Err(CorrelationError::InvalidConfig(
                    "CORRELATION_TENANT_KEY cannot contain control characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, CorrelationError> {
    let Ok(val) = env::var(name) else {
        return Ok(default);
    };

    deserialize_bool_from_anything(Value::String(val.trim().to_string())).map_err(|e| {
        CorrelationError::InvalidConfig(format!("{name} must be a boolean: {e}"))
    })
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => {
            error!(
                "Failed to parse value, expected a string, got: {}, ignoring",
                other
            );
            Ok(None)
        }
    }
}
