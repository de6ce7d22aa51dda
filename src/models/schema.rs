//! Schema-related data models.

use crate::db::types::{TypeCategory, categorize_type};
use crate::error::{BridgeError, BridgeResult};
use crate::models::Dialect;
use serde::Serialize;

/// A column as reported by the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as the catalog spells it (e.g. `int(11)`, `character varying(255)`)
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            is_primary_key: false,
        }
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }
}

/// Columns of one table, in ordinal order.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub dialect: Dialect,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(dialect: Dialect, table_name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            dialect,
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a caller-supplied column, failing with `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> BridgeResult<&ColumnInfo> {
        self.column(name)
            .ok_or_else(|| BridgeError::unknown_column(&self.table_name, name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Category of a column's declared type.
    pub fn category_of(&self, column: &ColumnInfo) -> TypeCategory {
        categorize_type(&column.data_type, self.dialect)
    }

    /// Column that identifies a single row.
    ///
    /// A single-column primary key wins; composite or missing keys fall back
    /// to a column named `id`.
    pub fn key_column(&self) -> Option<&ColumnInfo> {
        let mut pk = self.columns.iter().filter(|c| c.is_primary_key);
        match (pk.next(), pk.next()) {
            (Some(only), None) => Some(only),
            _ => self.column("id"),
        }
    }

    pub fn require_key_column(&self) -> BridgeResult<&ColumnInfo> {
        self.key_column()
            .ok_or_else(|| BridgeError::missing_key_column(&self.table_name))
    }
}
