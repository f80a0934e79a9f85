//! Catalog reader backed by the shared pool.

use super::{CatalogReader, CatalogRow};
use crate::db::Database;
use crate::otel::{db_span, record_db_metrics, DbOperation};
use crate::types::{AskError, Result};
use async_trait::async_trait;
use tracing::Instrument;

/// Base tables with their columns and key constraints.
///
/// `information_schema` exposes its own domain types (`sql_identifier`,
/// `cardinal_number`, `character_data`), so every column is cast to a plain
/// type before decoding.
pub const CATALOG_QUERY: &str = r#"
SELECT
    t.table_schema::text AS table_schema,
    t.table_name::text AS table_name,
    c.column_name::text AS column_name,
    c.data_type::text AS data_type,
    c.is_nullable::text AS is_nullable,
    c.column_default::text AS column_default,
    c.character_maximum_length::int4 AS character_maximum_length,
    c.numeric_precision::int4 AS numeric_precision,
    c.numeric_scale::int4 AS numeric_scale,
    tc.constraint_type::text AS constraint_type
FROM information_schema.tables t
LEFT JOIN information_schema.columns c
    ON c.table_schema = t.table_schema
    AND c.table_name = t.table_name
LEFT JOIN information_schema.key_column_usage kcu
    ON kcu.table_schema = c.table_schema
    AND kcu.table_name = c.table_name
    AND kcu.column_name = c.column_name
LEFT JOIN information_schema.table_constraints tc
    ON tc.constraint_schema = kcu.constraint_schema
    AND tc.constraint_name = kcu.constraint_name
    AND tc.table_name = kcu.table_name
WHERE t.table_type = 'BASE TABLE'
    AND t.table_schema NOT IN ('information_schema', 'pg_catalog')
ORDER BY t.table_schema, t.table_name, c.ordinal_position
"#;

#[async_trait]
impl CatalogReader for Database {
    async fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        let span = db_span(DbOperation::Catalog, self.name());
        async {
            let rows = sqlx::query_as::<_, CatalogRow>(CATALOG_QUERY)
                .fetch_all(self.pool())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Catalog query failed");
                    AskError::DataAccess(format!("Failed to read schema metadata: {}", e))
                })?;

            record_db_metrics(rows.len());
            Ok(rows)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_query_shape() {
        assert!(CATALOG_QUERY.contains("'BASE TABLE'"));
        assert!(CATALOG_QUERY.contains("NOT IN ('information_schema', 'pg_catalog')"));
        assert!(CATALOG_QUERY.trim_end().ends_with("c.ordinal_position"));
        assert_eq!(CATALOG_QUERY.matches("LEFT JOIN").count(), 3);
    }
}
