//! Schema model data structures.
//!
//! Describes the base tables of the target database as the pipeline sees them:
//! tables keyed by `(schema, table)`, columns in catalog ordinal order, and a
//! deduplicated constraint set per column.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One column of a base table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name (unique within its table)
    pub name: String,

    /// Declared type as reported by the catalog (e.g. `integer`, `character varying`)
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the column accepts NULL
    pub nullable: bool,

    /// Default expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Maximum character length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,

    /// Numeric precision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,

    /// Numeric scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,

    /// Constraint kinds observed on the column (`PRIMARY KEY`, `FOREIGN KEY`, ...)
    ///
    /// A set: repeated metadata rows for the same column collapse here.
    #[serde(default)]
    pub constraints: BTreeSet<String>,
}

impl ColumnDescriptor {
    /// Create a column with no default, length, precision or constraints.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            max_length: None,
            precision: None,
            scale: None,
            constraints: BTreeSet::new(),
        }
    }

    /// Add a constraint kind (builder style).
    pub fn with_constraint(mut self, kind: impl Into<String>) -> Self {
        self.constraints.insert(kind.into());
        self
    }

    /// Merge one constraint kind into the set.
    ///
    /// # Returns
    ///
    /// `true` if the kind was not already present
    pub fn merge_constraint(&mut self, kind: impl Into<String>) -> bool {
        self.constraints.insert(kind.into())
    }
}

/// Identity of a table: `(schema, table)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One base table with its columns in physical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Owning schema name
    pub schema: String,

    /// Table name
    pub table: String,

    /// Columns in catalog ordinal order
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Create a table with no columns.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column (builder style).
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn key(&self) -> TableKey {
        TableKey::new(&self.schema, &self.table)
    }

    /// Qualified name `schema.table`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

/// Aggregated description of a database's base tables.
///
/// Keyed by [`TableKey`] so iteration order is stable across aggregations of
/// the same catalog state. Serialized as a JSON array of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TableDescriptor>", into = "Vec<TableDescriptor>")]
pub struct SchemaModel {
    tables: BTreeMap<TableKey, TableDescriptor>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing any table with the same identity key.
    pub fn insert(&mut self, table: TableDescriptor) -> Option<TableDescriptor> {
        self.tables.insert(table.key(), table)
    }

    pub fn get(&self, schema: &str, table: &str) -> Option<&TableDescriptor> {
        self.tables.get(&TableKey::new(schema, table))
    }

    /// Tables in identity-key order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    pub(crate) fn entry(&mut self, key: TableKey) -> &mut TableDescriptor {
        self.tables
            .entry(key)
            .or_insert_with_key(|k| TableDescriptor::new(&k.schema, &k.table))
    }
}

impl From<Vec<TableDescriptor>> for SchemaModel {
    fn from(tables: Vec<TableDescriptor>) -> Self {
        let mut model = SchemaModel::new();
        for table in tables {
            model.insert(table);
        }
        model
    }
}

impl From<SchemaModel> for Vec<TableDescriptor> {
    fn from(model: SchemaModel) -> Self {
        model.tables.into_values().collect()
    }
}
