//! Pipeline run instrumentation.
//!
//! One INTERNAL span per run; the stage reached is recorded as the run advances.

use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Create the span for one pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// let span = pipeline_span(Uuid::new_v4());
/// async { /* stages */ }.instrument(span).await
/// ```
pub fn pipeline_span(run_id: Uuid) -> Span {
    span!(
        Level::INFO,
        "pipeline.run",
        otel.kind = "internal",
        run.id = %run_id,
        run.stage = field::Empty,
        run.status = field::Empty,
    )
}

/// Record the stage just reached on the current span.
pub fn record_stage(stage: &str) {
    Span::current().record("run.stage", stage);
}

/// Record final status (`success` or `failed`) on the current span.
pub fn record_status(status: &str) {
    Span::current().record("run.status", status);
}
