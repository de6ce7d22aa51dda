//! Parameter binding utilities for database queries.
//!
//! Binds `RecordValue` parameters to database-specific query objects. Values
//! only ever reach the server through these functions, never through SQL text.

use crate::models::RecordValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q RecordValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        RecordValue::Null => query.bind(None::<String>),
        RecordValue::Bool(v) => query.bind(*v),
        RecordValue::Int(v) => query.bind(*v),
        RecordValue::Float(v) => query.bind(*v),
        RecordValue::String(v) => query.bind(v.as_str()),
        RecordValue::Timestamp(v) => query.bind(*v),
        RecordValue::NaiveTimestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a PostgreSQL query.
///
/// The statement builder casts value placeholders to the column type, so a
/// text-typed NULL is accepted for any column.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q RecordValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        RecordValue::Null => query.bind(None::<String>),
        RecordValue::Bool(v) => query.bind(*v),
        RecordValue::Int(v) => query.bind(*v),
        RecordValue::Float(v) => query.bind(*v),
        RecordValue::String(v) => query.bind(v.as_str()),
        RecordValue::Timestamp(v) => query.bind(*v),
        RecordValue::NaiveTimestamp(v) => query.bind(*v),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q RecordValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        RecordValue::Null => query.bind(None::<String>),
        RecordValue::Bool(v) => query.bind(*v),
        RecordValue::Int(v) => query.bind(*v),
        RecordValue::Float(v) => query.bind(*v),
        RecordValue::String(v) => query.bind(v.as_str()),
        RecordValue::Timestamp(v) => query.bind(*v),
        RecordValue::NaiveTimestamp(v) => query.bind(*v),
    }
}
