//! Schema aggregation.
//!
//! Reads catalog metadata with one query and folds the rows into a
//! [`SchemaModel`]. The metadata query joins columns with key constraints, so
//! one column can appear on several rows (once per constraint); those rows
//! merge into a single column whose constraint set accumulates.

pub mod postgres;

pub use postgres::CATALOG_QUERY;

use crate::types::{AskError, ColumnDescriptor, Result, SchemaModel, TableKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of the catalog metadata query.
///
/// Column fields are `None` for a base table with no columns (LEFT JOIN).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogRow {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: Option<String>,
    pub data_type: Option<String>,
    pub is_nullable: Option<String>,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub constraint_type: Option<String>,
}

/// Source of catalog metadata rows.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Read every metadata row, ordered by schema, table and column position.
    ///
    /// # Errors
    ///
    /// Returns `AskError::DataAccess`; never a partial row set
    async fn catalog_rows(&self) -> Result<Vec<CatalogRow>>;
}

impl SchemaModel {
    /// Fold catalog rows into a model.
    ///
    /// Rows must arrive in column ordinal order per table; columns are appended
    /// in the order first seen.
    pub fn from_catalog_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let mut model = SchemaModel::new();

        for row in rows {
            let table = model.entry(TableKey::new(row.table_schema, row.table_name));

            let Some(column_name) = row.column_name else {
                continue;
            };

            match table.column_mut(&column_name) {
                Some(existing) => {
                    if let Some(kind) = row.constraint_type {
                        existing.merge_constraint(kind);
                    }
                }
                None => {
                    let mut column = ColumnDescriptor::new(
                        column_name,
                        row.data_type.unwrap_or_default(),
                        row.is_nullable.as_deref() == Some("YES"),
                    );
                    column.default = row.column_default;
                    column.max_length = row.character_maximum_length;
                    column.precision = row.numeric_precision;
                    column.scale = row.numeric_scale;
                    if let Some(kind) = row.constraint_type {
                        column.merge_constraint(kind);
                    }
                    table.columns.push(column);
                }
            }
        }

        model
    }

    /// Load a model previously written with [`SchemaModel::to_json_pretty`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            AskError::validation(format!(
                "Invalid schema file {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reads the live catalog and builds a fresh [`SchemaModel`].
///
/// Nothing is cached: every call re-reads the catalog.
pub struct SchemaAggregator;

impl SchemaAggregator {
    /// Aggregate the schema behind `reader`.
    ///
    /// # Errors
    ///
    /// Returns `AskError::DataAccess` if the metadata query fails; no partial
    /// model is ever returned
    pub async fn aggregate(reader: &dyn CatalogReader) -> Result<SchemaModel> {
        let rows = reader.catalog_rows().await?;
        let row_count = rows.len();
        let model = SchemaModel::from_catalog_rows(rows);

        tracing::info!(
            rows = row_count,
            tables = model.len(),
            columns = model.column_count(),
            "Schema aggregated"
        );

        Ok(model)
    }
}
