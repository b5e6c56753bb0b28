// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log formatting for the correlation layer.
//!
//! Every line is prefixed with `CORRELATION` so correlation logs can be told
//! apart from the host application's own:
//!
//! ```text
//! CORRELATION | DEBUG | Resolved trace 4bf92f3577b34da6a3ce929d0e0e4736 from TraceContext
//! CORRELATION | WARN | request{method=GET}: Request ended without being started
//! ```

use std::fmt;

use tracing_core::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::{self, FormatEvent, FormatFields},
        FmtContext, FormattedFields,
    },
    registry::LookupSpan,
    EnvFilter,
};

use crate::{config::Config, error::CorrelationError};

/// Formats events as `CORRELATION | LEVEL | span{fields}: message fields`.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "CORRELATION | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Installs a global subscriber using [`Formatter`] at the configured level.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init(config: &Config) -> Result<(), CorrelationError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_filter_directive()))
        .map_err(|e| CorrelationError::Logging(e.to_string()))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CorrelationError::Logging(e.to_string()))
}
