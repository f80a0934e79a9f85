//! Tracing setup and span helpers.
//!
//! Spans follow OpenTelemetry semantic conventions so they map cleanly onto an
//! OTel exporter if one is layered on later:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//! - https://opentelemetry.io/docs/specs/semconv/gen-ai/
//!
//! # Span naming
//!
//! - `db`: `{db.operation.name} {db.namespace}`, e.g. `query hr`
//! - `gen_ai.chat`: `chat {model}`
//! - `pipeline.run`: one per question, carries `run.id` and `run.stage`
//!
//! # Example
//!
//! ```rust,ignore
//! use askdb::otel::{init_tracing, LogFormat};
//!
//! init_tracing(LogFormat::Pretty);
//! tracing::info!("ready");
//! ```

pub mod db;
pub mod llm;
pub mod pipeline;

pub use db::{db_query_span, db_span, record_db_metrics, DbOperation};
pub use llm::llm_span;
pub use pipeline::{pipeline_span, record_stage, record_status};

use std::str::FromStr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides levels; falls back to `info`. Calling twice is a
/// no-op for the second call.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(LogFormat::Pretty);
        init_tracing(LogFormat::Json);
    }
}
