// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while wiring up request correlation.
///
/// None of these can happen on the request path.
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("A telemetry sink is required to build the correlation controller")]
    MissingSink,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
