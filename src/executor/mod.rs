//! Execution of approved statements.

pub mod decode;

pub use decode::decode_row;

use crate::otel::{db_query_span, record_db_metrics};
use crate::types::{AskError, Result, ResultRow, SqlStatement};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::Instrument;

/// Something that can run an approved statement and hand back its rows.
#[async_trait]
pub trait StatementRunner: Send + Sync {
    async fn run(&self, statement: &SqlStatement) -> Result<Vec<ResultRow>>;
}

/// Runs statements on the shared pool.
///
/// Each call checks out one connection and returns it before the result (or
/// error) reaches the caller. Statements go through the extended query
/// protocol, so the server itself refuses more than one statement per call.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: PgPool,
    namespace: String,
}

impl QueryExecutor {
    pub fn new(pool: PgPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    async fn fetch(&self, statement: &SqlStatement) -> Result<Vec<ResultRow>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AskError::Execution(format!("Failed to acquire connection: {}", e)))?;

        let fetched = sqlx::query(statement.as_str())
            .persistent(false)
            .fetch_all(&mut *conn)
            .await;

        // Back to the pool before decoding or reporting.
        drop(conn);

        let rows = fetched.map_err(|e| AskError::Execution(database_message(&e)))?;

        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AskError::Execution(format!("Failed to decode row: {}", e)))?;

        record_db_metrics(decoded.len());
        Ok(decoded)
    }
}

#[async_trait]
impl StatementRunner for QueryExecutor {
    async fn run(&self, statement: &SqlStatement) -> Result<Vec<ResultRow>> {
        let span = db_query_span(statement.as_str(), &self.namespace);
        async {
            let result = self.fetch(statement).await;
            match &result {
                Ok(rows) => tracing::info!(rows = rows.len(), "Query executed"),
                Err(e) => tracing::error!(error = %e, "Query failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Prefer the server's own message over sqlx's wrapper text.
fn database_message(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db_err) => match db_err.code() {
            Some(code) => format!("{} (SQLSTATE {})", db_err.message(), code),
            None => db_err.message().to_string(),
        },
        None => err.to_string(),
    }
}
