//! Parameterized statement construction.
//!
//! Only identifiers taken from the live catalog are written into SQL text;
//! every value goes into `Statement::params` and is bound by the driver.
//! Caller-supplied column names are checked against the catalog before any
//! text is produced, so an unknown column never reaches the server.

use crate::db::types::{TypeCategory, has_time_zone};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{ColumnInfo, Dialect, RecordPayload, RecordValue, TableSchema};
use chrono::{DateTime, Utc};

/// Reserved soft-delete columns.
pub const ACTIVE_COLUMN: &str = "active";
pub const DELETED_COLUMN: &str = "deleted";
pub const DELETED_BY_COLUMN: &str = "deleted_by_guid";
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<RecordValue>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }
}

/// Builds statements for one introspected table.
pub struct StatementBuilder<'a> {
    schema: &'a TableSchema,
    dialect: Dialect,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            dialect: schema.dialect,
        }
    }

    /// `SELECT <columns> FROM t [ORDER BY key] LIMIT ? OFFSET ?`
    pub fn select_page(&self, limit: u64, offset: u64) -> Statement {
        let mut stmt = Statement::new();
        let columns = self
            .schema
            .columns
            .iter()
            .map(|c| self.select_expr(c))
            .collect::<Vec<_>>()
            .join(", ");

        let order_by = self
            .schema
            .key_column()
            .map(|k| format!(" ORDER BY {}", self.quote(&k.name)))
            .unwrap_or_default();

        let limit_ph = self.push_param(&mut stmt, None, RecordValue::Int(to_i64(limit)));
        let offset_ph = self.push_param(&mut stmt, None, RecordValue::Int(to_i64(offset)));

        stmt.sql = format!(
            "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
            columns,
            self.table(),
            order_by,
            limit_ph,
            offset_ph
        );
        stmt
    }

    /// `SELECT COUNT(*) FROM t`
    pub fn count(&self) -> Statement {
        let mut stmt = Statement::new();
        stmt.sql = format!("SELECT COUNT(*) FROM {}", self.table());
        stmt
    }

    /// `SELECT COUNT(*) FROM t WHERE key = ?`
    pub fn exists(&self, id: i64) -> BridgeResult<Statement> {
        let key = self.schema.require_key_column()?;
        let mut stmt = Statement::new();
        let predicate = self.key_predicate(&mut stmt, key, id);
        stmt.sql = format!("SELECT COUNT(*) FROM {} WHERE {}", self.table(), predicate);
        Ok(stmt)
    }

    /// `INSERT INTO t (a, b) VALUES (?, ?)`
    pub fn insert(&self, payload: &RecordPayload) -> BridgeResult<Statement> {
        let columns = self.validate_payload(payload)?;

        let mut stmt = Statement::new();
        let mut names = Vec::with_capacity(columns.len());
        let mut placeholders = Vec::with_capacity(columns.len());
        for (column, value) in columns {
            names.push(self.quote(&column.name));
            placeholders.push(self.push_param(&mut stmt, Some(column), value.clone()));
        }

        stmt.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders.join(", ")
        );
        Ok(stmt)
    }

    /// `UPDATE t SET a = ?, b = ? WHERE key = ?`
    ///
    /// Used for both full (PUT) and partial (PATCH) updates; the payload
    /// decides which columns are touched.
    pub fn update(&self, id: i64, payload: &RecordPayload) -> BridgeResult<Statement> {
        let columns = self.validate_payload(payload)?;
        let key = self.schema.require_key_column()?;

        let assignments: Vec<(&ColumnInfo, RecordValue)> = columns
            .into_iter()
            .map(|(column, value)| (column, value.clone()))
            .collect();
        Ok(self.build_update(key, id, assignments))
    }

    /// Flag a row as deleted without removing it.
    ///
    /// Boolean flag columns get booleans, anything else 0/1. An integer
    /// `deleted_at` receives Unix seconds, any other type the timestamp. A
    /// PostgreSQL timestamp without time zone gets the UTC wall-clock time.
    pub fn soft_delete(
        &self,
        id: i64,
        deleted_by_guid: i64,
        deleted_at: DateTime<Utc>,
    ) -> BridgeResult<Statement> {
        let key = self.schema.require_key_column()?;
        let active = self.schema.require_column(ACTIVE_COLUMN)?;
        let deleted = self.schema.require_column(DELETED_COLUMN)?;
        let deleted_by = self.schema.require_column(DELETED_BY_COLUMN)?;
        let deleted_at_col = self.schema.require_column(DELETED_AT_COLUMN)?;

        let deleted_at_value = match self.schema.category_of(deleted_at_col) {
            TypeCategory::Integer => RecordValue::Int(deleted_at.timestamp()),
            TypeCategory::Timestamp
                if self.dialect == Dialect::Postgres
                    && !has_time_zone(&deleted_at_col.data_type) =>
            {
                RecordValue::NaiveTimestamp(deleted_at.naive_utc())
            }
            _ => RecordValue::Timestamp(deleted_at),
        };

        let assignments = vec![
            (active, self.flag_value(active, false)),
            (deleted, self.flag_value(deleted, true)),
            (deleted_by, RecordValue::Int(deleted_by_guid)),
            (deleted_at_col, deleted_at_value),
        ];
        Ok(self.build_update(key, id, assignments))
    }

    /// `DELETE FROM t WHERE key = ?`
    pub fn delete(&self, id: i64) -> BridgeResult<Statement> {
        let key = self.schema.require_key_column()?;
        let mut stmt = Statement::new();
        let predicate = self.key_predicate(&mut stmt, key, id);
        stmt.sql = format!("DELETE FROM {} WHERE {}", self.table(), predicate);
        Ok(stmt)
    }

    fn build_update(
        &self,
        key: &ColumnInfo,
        id: i64,
        assignments: Vec<(&ColumnInfo, RecordValue)>,
    ) -> Statement {
        let mut stmt = Statement::new();
        let set_clause = assignments
            .into_iter()
            .map(|(column, value)| {
                let ph = self.push_param(&mut stmt, Some(column), value);
                format!("{} = {}", self.quote(&column.name), ph)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let predicate = self.key_predicate(&mut stmt, key, id);

        stmt.sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table(),
            set_clause,
            predicate
        );
        stmt
    }

    /// Resolve every payload column against the catalog.
    fn validate_payload<'p>(
        &self,
        payload: &'p RecordPayload,
    ) -> BridgeResult<Vec<(&'a ColumnInfo, &'p RecordValue)>> {
        if payload.is_empty() {
            return Err(BridgeError::invalid_input(format!(
                "Payload for {} must contain at least one column",
                self.schema.table_name
            )));
        }
        payload
            .iter()
            .map(|(name, value)| -> BridgeResult<(&'a ColumnInfo, &'p RecordValue)> {
                Ok((self.schema.require_column(name)?, value))
            })
            .collect()
    }

    fn key_predicate(&self, stmt: &mut Statement, key: &ColumnInfo, id: i64) -> String {
        let ph = self.push_param(stmt, Some(key), RecordValue::Int(id));
        format!("{} = {}", self.quote(&key.name), ph)
    }

    /// Append a value and return its placeholder.
    ///
    /// PostgreSQL placeholders are cast to the column's catalog type so that
    /// text and NULL binds coerce like literals would.
    fn push_param(
        &self,
        stmt: &mut Statement,
        column: Option<&ColumnInfo>,
        value: RecordValue,
    ) -> String {
        stmt.params.push(value);
        let ph = self.dialect.placeholder(stmt.params.len());
        match (self.dialect, column) {
            (Dialect::Postgres, Some(col)) => format!("CAST({} AS {})", ph, col.data_type),
            _ => ph,
        }
    }

    fn select_expr(&self, column: &ColumnInfo) -> String {
        let quoted = self.quote(&column.name);
        if !self.schema.category_of(column).needs_text_cast() {
            return quoted;
        }
        match self.dialect {
            Dialect::Postgres => format!("CAST({} AS TEXT) AS {}", quoted, quoted),
            Dialect::MySql => format!("CAST({} AS CHAR) AS {}", quoted, quoted),
            Dialect::Sqlite => quoted,
        }
    }

    fn flag_value(&self, column: &ColumnInfo, set: bool) -> RecordValue {
        match self.schema.category_of(column) {
            TypeCategory::Boolean => RecordValue::Bool(set),
            _ => RecordValue::Int(i64::from(set)),
        }
    }

    fn table(&self) -> String {
        self.quote(&self.schema.table_name)
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn items(dialect: Dialect, types: [&str; 7]) -> TableSchema {
        let names = ["id", "name", "value", ACTIVE_COLUMN, DELETED_COLUMN, DELETED_BY_COLUMN, DELETED_AT_COLUMN];
        let columns = names
            .iter()
            .zip(types)
            .map(|(n, t)| ColumnInfo::new(*n, t, *n != "id").with_primary_key(*n == "id"))
            .collect();
        TableSchema::new(dialect, "items", columns)
    }

    fn mysql_items() -> TableSchema {
        items(
            Dialect::MySql,
            ["int(11)", "varchar(255)", "decimal(10,2)", "tinyint(1)", "tinyint(1)", "bigint", "int(11)"],
        )
    }

    fn pg_items() -> TableSchema {
        items(
            Dialect::Postgres,
            [
                "integer",
                "character varying(255)",
                "integer",
                "boolean",
                "boolean",
                "bigint",
                "timestamp without time zone",
            ],
        )
    }

    fn sqlite_items() -> TableSchema {
        items(
            Dialect::Sqlite,
            ["INTEGER", "TEXT", "INTEGER", "INTEGER", "INTEGER", "INTEGER", "INTEGER"],
        )
    }

    #[test]
    fn test_select_page_mysql() {
        let schema = mysql_items();
        let stmt = StatementBuilder::new(&schema).select_page(10, 20);
        assert_eq!(
            stmt.sql,
            "SELECT `id`, `name`, CAST(`value` AS CHAR) AS `value`, `active`, `deleted`, \
             `deleted_by_guid`, `deleted_at` FROM `items` ORDER BY `id` LIMIT ? OFFSET ?"
        );
        assert_eq!(stmt.params, vec![RecordValue::Int(10), RecordValue::Int(20)]);
    }

    #[test]
    fn test_select_page_postgres_numbers_placeholders() {
        let schema = pg_items();
        let stmt = StatementBuilder::new(&schema).select_page(5, 0);
        assert!(stmt.sql.starts_with("SELECT \"id\", \"name\", \"value\""));
        assert!(stmt.sql.ends_with("FROM \"items\" ORDER BY \"id\" LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_count() {
        let schema = sqlite_items();
        let stmt = StatementBuilder::new(&schema).count();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM \"items\"");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_insert_binds_values() {
        let schema = sqlite_items();
        let payload = RecordPayload::new().with("name", "a").with("value", 1);
        let stmt = StatementBuilder::new(&schema).insert(&payload).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO \"items\" (\"name\", \"value\") VALUES (?, ?)");
        assert_eq!(stmt.params, vec![RecordValue::from("a"), RecordValue::Int(1)]);
    }

    #[test]
    fn test_insert_never_inlines_values() {
        let schema = sqlite_items();
        let payload = RecordPayload::new().with("name", "x'); DROP TABLE items; --");
        let stmt = StatementBuilder::new(&schema).insert(&payload).unwrap();
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_insert_postgres_casts_to_column_type() {
        let schema = pg_items();
        let payload = RecordPayload::new().with("name", "a").with("value", 3);
        let stmt = StatementBuilder::new(&schema).insert(&payload).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"items\" (\"name\", \"value\") VALUES \
             (CAST($1 AS character varying(255)), CAST($2 AS integer))"
        );
    }

    #[test]
    fn test_unknown_column_rejected() {
        let schema = mysql_items();
        let payload = RecordPayload::new().with("name", "a").with("name; DROP TABLE x", 1);
        let builder = StatementBuilder::new(&schema);
        let err = builder.insert(&payload).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownColumn { ref column, .. } if column == "name; DROP TABLE x"));
        assert!(matches!(
            builder.update(1, &payload),
            Err(BridgeError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let schema = mysql_items();
        let err = StatementBuilder::new(&schema)
            .insert(&RecordPayload::new())
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput { .. }));
    }

    #[test]
    fn test_update_mysql() {
        let schema = mysql_items();
        let payload = RecordPayload::new().with("name", "b");
        let stmt = StatementBuilder::new(&schema).update(7, &payload).unwrap();
        assert_eq!(stmt.sql, "UPDATE `items` SET `name` = ? WHERE `id` = ?");
        assert_eq!(stmt.params, vec![RecordValue::from("b"), RecordValue::Int(7)]);
    }

    #[test]
    fn test_update_postgres_numbers_key_last() {
        let schema = pg_items();
        let payload = RecordPayload::new().with("name", "b").with("value", 2);
        let stmt = StatementBuilder::new(&schema).update(7, &payload).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"items\" SET \"name\" = CAST($1 AS character varying(255)), \
             \"value\" = CAST($2 AS integer) WHERE \"id\" = CAST($3 AS integer)"
        );
    }

    #[test]
    fn test_delete_and_exists() {
        let schema = sqlite_items();
        let builder = StatementBuilder::new(&schema);
        let stmt = builder.delete(3).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"items\" WHERE \"id\" = ?");
        assert_eq!(stmt.params, vec![RecordValue::Int(3)]);

        let stmt = builder.exists(3).unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM \"items\" WHERE \"id\" = ?");
    }

    #[test]
    fn test_soft_delete_integer_columns() {
        let schema = sqlite_items();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let stmt = StatementBuilder::new(&schema).soft_delete(5, 42, at).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"items\" SET \"active\" = ?, \"deleted\" = ?, \"deleted_by_guid\" = ?, \
             \"deleted_at\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                RecordValue::Int(0),
                RecordValue::Int(1),
                RecordValue::Int(42),
                RecordValue::Int(at.timestamp()),
                RecordValue::Int(5),
            ]
        );
    }

    #[test]
    fn test_soft_delete_boolean_and_timestamp_columns() {
        let schema = pg_items();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let stmt = StatementBuilder::new(&schema).soft_delete(5, 42, at).unwrap();
        assert_eq!(stmt.params[0], RecordValue::Bool(false));
        assert_eq!(stmt.params[1], RecordValue::Bool(true));
        assert_eq!(stmt.params[3], RecordValue::NaiveTimestamp(at.naive_utc()));
        assert!(stmt.sql.contains("CAST($4 AS timestamp without time zone)"));
    }

    #[test]
    fn test_soft_delete_zoned_timestamp_keeps_offset() {
        let mut types = [
            "integer",
            "character varying(255)",
            "integer",
            "boolean",
            "boolean",
            "bigint",
            "timestamp with time zone",
        ];
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let schema = items(Dialect::Postgres, types);
        let stmt = StatementBuilder::new(&schema).soft_delete(5, 42, at).unwrap();
        assert_eq!(stmt.params[3], RecordValue::Timestamp(at));

        types[6] = "datetime";
        let schema = items(Dialect::MySql, types);
        let stmt = StatementBuilder::new(&schema).soft_delete(5, 42, at).unwrap();
        assert_eq!(stmt.params[3], RecordValue::Timestamp(at));
    }

    #[test]
    fn test_select_page_postgres_reads_arrays_as_text() {
        let schema = items(
            Dialect::Postgres,
            [
                "integer",
                "text[]",
                "integer[]",
                "boolean",
                "boolean",
                "bigint",
                "timestamp without time zone",
            ],
        );
        let stmt = StatementBuilder::new(&schema).select_page(5, 0);
        assert!(stmt.sql.contains("CAST(\"name\" AS TEXT) AS \"name\""));
        assert!(stmt.sql.contains("CAST(\"value\" AS TEXT) AS \"value\""));
        assert!(stmt.sql.contains(", \"deleted_at\" FROM"));
    }

    #[test]
    fn test_soft_delete_requires_reserved_columns() {
        let schema = TableSchema::new(
            Dialect::Sqlite,
            "plain",
            vec![ColumnInfo::new("id", "INTEGER", false).with_primary_key(true)],
        );
        let err = StatementBuilder::new(&schema)
            .soft_delete(1, 1, Utc::now())
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownColumn { ref column, .. } if column == ACTIVE_COLUMN));
    }

    #[test]
    fn test_mutation_without_key_column() {
        let schema = TableSchema::new(
            Dialect::MySql,
            "log",
            vec![ColumnInfo::new("line", "text", true)],
        );
        let builder = StatementBuilder::new(&schema);
        assert!(matches!(builder.delete(1), Err(BridgeError::MissingKeyColumn { .. })));
        // no key: listing still works, just unordered
        assert!(!builder.select_page(1, 0).sql.contains("ORDER BY"));
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let schema = TableSchema::new(
            Dialect::MySql,
            "odd`name",
            vec![ColumnInfo::new("id", "int", false).with_primary_key(true)],
        );
        let stmt = StatementBuilder::new(&schema).count();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM `odd``name`");
    }
}
