//! Database operation instrumentation.
//!
//! Implements OpenTelemetry semantic conventions for PostgreSQL calls.

use tracing::{field, span, Level, Span};

/// Database operation types (maps to `db.operation.name`).
#[derive(Debug, Clone, Copy)]
pub enum DbOperation {
    /// Catalog metadata read for schema aggregation
    Catalog,
    /// Approved statement execution
    Query,
}

impl DbOperation {
    /// Get operation name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Query => "query",
        }
    }
}

/// Create database operation span with semantic conventions.
///
/// # Arguments
///
/// * `operation` - Database operation type
/// * `namespace` - Database name
///
/// # Returns
///
/// Tracing span with OpenTelemetry semantic attributes; `db.query.text` and
/// `db.response.returned_rows` are recorded later
pub fn db_span(operation: DbOperation, namespace: &str) -> Span {
    span!(
        Level::INFO,
        "db",
        otel.name = %format!("{} {}", operation.as_str(), namespace),
        otel.kind = "client",
        db.system.name = "postgresql",
        db.operation.name = operation.as_str(),
        db.namespace = namespace,
        db.query.text = field::Empty,
        db.response.returned_rows = field::Empty,
    )
}

/// Create span for executing a statement.
///
/// # Example
///
/// ```rust,ignore
/// let span = db_query_span("SELECT e.name FROM public.employees e LIMIT 50", "hr");
/// async { runner.run(&stmt).await }.instrument(span).await
/// ```
pub fn db_query_span(query_text: &str, namespace: &str) -> Span {
    let span = db_span(DbOperation::Query, namespace);
    span.record("db.query.text", query_text);
    span
}

/// Record returned row count on the current span.
pub fn record_db_metrics(rows_returned: usize) {
    Span::current().record("db.response.returned_rows", rows_returned);
}
