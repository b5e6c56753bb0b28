// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error type for correlation header parsing.
//!
//! Header errors never leave the codec boundary as hard failures. Callers log
//! them at `debug` level and treat the header as absent, so a malformed header
//! degrades correlation instead of failing the request.

use thiserror::Error;

/// Error raised while extracting a correlation field from a header.
///
/// Formatted as `"Cannot extract from {message}, {header}"`, for example
/// `"Cannot extract from invalid traceparent, traceparent"`.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("Cannot {} from {}, {}", operation, message, header)]
pub struct ExtractError {
    /// What went wrong, e.g. `"invalid traceparent"`.
    message: &'static str,
    /// Name of the header being parsed.
    header: &'static str,
    /// Operation that failed (`"extract"` or `"inject"`).
    operation: &'static str,
}

impl ExtractError {
    /// Creates an extraction error for `header`.
    ///
    /// # Example
    ///
    /// ```
    /// use request_correlation::headers::error::ExtractError;
    ///
    /// let err = ExtractError::extract("invalid traceparent", "traceparent");
    /// assert_eq!(err.to_string(), "Cannot extract from invalid traceparent, traceparent");
    /// ```
    #[must_use]
    pub fn extract(message: &'static str, header: &'static str) -> Self {
        Self {
            message,
            header,
            operation: "extract",
        }
    }

    /// Creates an injection error for `header`.
    #[must_use]
    pub fn inject(message: &'static str, header: &'static str) -> Self {
        Self {
            message,
            header,
            operation: "inject",
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        self.message
    }

    #[must_use]
    pub fn header(&self) -> &'static str {
        self.header
    }
}
