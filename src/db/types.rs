//! Database-agnostic type mappings.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders extract the value into a [`RecordValue`]
//!
//! The same classifier is applied to catalog type names (`int(11)`,
//! `timestamp without time zone`) and to driver type names (`INT4`,
//! `DATETIME`), so the statement builder and the row decoder agree.

use crate::models::{Dialect, RecordValue};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Time,
    Text,
    Binary,
    Json,
    Uuid,
    Unknown,
}

impl TypeCategory {
    /// Whether rows of this category are read back through a text cast.
    ///
    /// Only integer, float, boolean, timestamp, text and binary values are
    /// decoded natively; everything else is selected as text on servers that
    /// type their result columns strictly.
    pub fn needs_text_cast(&self) -> bool {
        !matches!(
            self,
            Self::Integer | Self::Float | Self::Boolean | Self::Timestamp | Self::Text | Self::Binary
        )
    }
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, dialect: Dialect) -> TypeCategory {
    let lower = type_name.trim().to_lowercase();

    // Arrays (`integer[]`, `INT4[]`) are read as their text form
    if lower.ends_with("[]") {
        return TypeCategory::Unknown;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if dialect == Dialect::Sqlite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.starts_with("bool") {
        return TypeCategory::Boolean;
    }

    if lower.starts_with("timestamp") || lower.starts_with("datetime") {
        return TypeCategory::Timestamp;
    }
    if lower.starts_with("date") {
        return TypeCategory::Date;
    }
    if lower.starts_with("time") {
        return TypeCategory::Time;
    }

    if lower.starts_with("interval") || lower.contains("point") {
        return TypeCategory::Unknown;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.starts_with("json") {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char")
        || lower.contains("text")
        || lower.contains("clob")
        || lower == "name"
        || lower == "string"
    {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Whether a timestamp type name carries a time zone (`timestamptz`,
/// `timestamp with time zone`).
pub fn has_time_zone(type_name: &str) -> bool {
    let lower = type_name.trim().to_lowercase();
    lower.starts_with("timestamptz")
        || (lower.contains("with time zone") && !lower.contains("without time zone"))
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Render binary data as text: UTF-8 when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> RecordValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => RecordValue::String(s.to_string()),
        Err(_) => RecordValue::String(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Trait for converting database rows into scalar values by position.
pub trait RowDecode {
    fn decode_values(&self) -> Vec<RecordValue>;
}

impl RowDecode for MySqlRow {
    fn decode_values(&self) -> Vec<RecordValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::MySql);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowDecode for PgRow {
    fn decode_values(&self) -> Vec<RecordValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::Postgres);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowDecode for SqliteRow {
    fn decode_values(&self) -> Vec<RecordValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::Sqlite);
                sqlite::decode_column(self, idx, category)
            })
            .collect()
    }
}

fn float_value(v: f64) -> RecordValue {
    RecordValue::Float(v)
}

fn naive_timestamp(v: NaiveDateTime) -> RecordValue {
    RecordValue::Timestamp(v.and_utc())
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> RecordValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> RecordValue {
        // Check NULL first
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return RecordValue::Null;
        }
        // Try signed types
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return RecordValue::Int(v);
        }
        // Try unsigned types
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return i64::try_from(v)
                .map(RecordValue::Int)
                .unwrap_or_else(|_| RecordValue::String(v.to_string()));
        }
        RecordValue::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> RecordValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(RecordValue::Bool)
            .unwrap_or(RecordValue::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v.into());
        }
        RecordValue::Null
    }

    fn decode_timestamp(row: &MySqlRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return RecordValue::Timestamp(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return naive_timestamp(v);
        }
        RecordValue::Null
    }

    fn decode_binary_col(row: &MySqlRow, idx: usize) -> RecordValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(RecordValue::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return RecordValue::String(v);
        }
        // Text casts may come back as VARBINARY depending on connection charset
        decode_binary_col(row, idx)
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> RecordValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return RecordValue::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return RecordValue::Int(v);
        }
        RecordValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> RecordValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(RecordValue::Bool)
            .unwrap_or(RecordValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v.into());
        }
        RecordValue::Null
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> RecordValue {
        // TIMESTAMPTZ
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return RecordValue::Timestamp(v);
        }
        // TIMESTAMP
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return naive_timestamp(v);
        }
        RecordValue::Null
    }

    fn decode_binary_col(row: &PgRow, idx: usize) -> RecordValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(RecordValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> RecordValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(RecordValue::String)
            .unwrap_or(RecordValue::Null)
    }
}

mod sqlite {
    use super::*;

    /// SQLite stores values dynamically, so each decoder falls back to text
    /// when the stored value does not match the declared affinity.
    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> RecordValue {
        let value = match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            _ => None,
        };
        value.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Option<RecordValue> {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) => Some(RecordValue::Int(v)),
            Ok(None) => Some(RecordValue::Null),
            Err(_) => None,
        }
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> Option<RecordValue> {
        match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(v)) => Some(RecordValue::Bool(v)),
            Ok(None) => Some(RecordValue::Null),
            Err(_) => None,
        }
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Option<RecordValue> {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(v)) => Some(float_value(v)),
            Ok(None) => Some(RecordValue::Null),
            Err(_) => None,
        }
    }

    fn decode_timestamp(row: &SqliteRow, idx: usize) -> Option<RecordValue> {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Some(RecordValue::Timestamp(v));
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Some(naive_timestamp(v));
        }
        // Epoch integers stored in a DATETIME column
        decode_integer(row, idx)
    }

    fn decode_binary_col(row: &SqliteRow, idx: usize) -> Option<RecordValue> {
        match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(v)) => Some(decode_binary_value(&v)),
            Ok(None) => Some(RecordValue::Null),
            Err(_) => None,
        }
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> RecordValue {
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<String>, _>(idx) {
            return RecordValue::String(v);
        }
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<i64>, _>(idx) {
            return RecordValue::Int(v);
        }
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        RecordValue::Null
    }
}
