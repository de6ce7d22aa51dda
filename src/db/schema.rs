//! Schema introspection.
//!
//! Reads a table's columns from the live catalog. Inspection runs on the
//! request's own session so that the statements built from the result see
//! the same snapshot they execute against.
//!
//! # Architecture
//!
//! Catalog queries live in the `queries` submodule; each dialect has its own
//! submodule that runs them and maps rows into `ColumnInfo`.

use crate::db::session::Session;
use crate::error::{BridgeError, BridgeResult};
use crate::models::{ColumnInfo, TableSchema};
use tracing::debug;

/// Schema inspector for catalog lookups.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Columns of `table` in ordinal order.
    ///
    /// A table the catalog does not know (or a name that is not a plain
    /// table or view) yields `TableNotFound`.
    pub async fn columns(session: &mut Session, table: &str) -> BridgeResult<TableSchema> {
        let dialect = session.dialect();
        let columns = match session {
            Session::MySql(tx) => mysql::fetch_columns(&mut **tx, table).await?,
            Session::Postgres(tx) => postgres::fetch_columns(&mut **tx, table).await?,
            Session::Sqlite(tx) => sqlite::fetch_columns(&mut **tx, table).await?,
        };

        if columns.is_empty() {
            return Err(BridgeError::table_not_found(table));
        }

        debug!(table = %table, columns = columns.len(), "Loaded table schema");
        Ok(TableSchema::new(dialect, table, columns))
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            a.attname::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            NOT a.attnotnull AS is_nullable,
            COALESCE(i.indisprimary, false) AS is_primary_key
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_index i
            ON i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
        WHERE c.relname = $1
          AND n.nspname = current_schema()
          AND a.attnum > 0
          AND NOT a.attisdropped
          AND c.relkind IN ('r', 'p', 'v')
        ORDER BY a.attnum
        "#;
    }

    pub mod mysql {
        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY
        FROM information_schema.columns
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()
        ORDER BY ORDINAL_POSITION
        "#;
    }

    pub mod sqlite {
        pub const DESCRIBE_COLUMNS: &str =
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?)"#;
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::{PgConnection, Row};

    pub async fn fetch_columns(
        conn: &mut PgConnection,
        table_name: &str,
    ) -> BridgeResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(conn)
            .await?;

        rows.iter()
            .map(|row| -> BridgeResult<ColumnInfo> {
                let name: String = row.try_get("column_name")?;
                let data_type: String = row.try_get("column_type")?;
                let nullable: bool = row.try_get("is_nullable")?;
                let is_pk: bool = row.try_get("is_primary_key")?;
                Ok(ColumnInfo::new(name, data_type, nullable).with_primary_key(is_pk))
            })
            .collect()
    }
}

mod mysql {
    use super::*;
    use sqlx::{MySqlConnection, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &sqlx::mysql::MySqlRow, column: &str) -> String {
        row.try_get::<String, _>(column)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(column)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .unwrap_or_default()
    }

    pub async fn fetch_columns(
        conn: &mut MySqlConnection,
        table_name: &str,
    ) -> BridgeResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(conn)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name = get_string(row, "COLUMN_NAME");
                let column_type = get_string(row, "COLUMN_TYPE");
                let nullable = get_string(row, "IS_NULLABLE");
                let column_key = get_string(row, "COLUMN_KEY");
                ColumnInfo::new(name, column_type, nullable == "YES")
                    .with_primary_key(column_key == "PRI")
            })
            .collect())
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqliteConnection};

    pub async fn fetch_columns(
        conn: &mut SqliteConnection,
        table_name: &str,
    ) -> BridgeResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(conn)
            .await?;

        rows.iter()
            .map(|row| -> BridgeResult<ColumnInfo> {
                let name: String = row.try_get("name")?;
                let data_type: String = row.try_get("type")?;
                let notnull: i64 = row.try_get("notnull")?;
                let pk: i64 = row.try_get("pk")?;
                Ok(ColumnInfo::new(name, data_type, notnull == 0).with_primary_key(pk > 0))
            })
            .collect()
    }
}
