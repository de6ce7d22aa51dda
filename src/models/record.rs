//! Schema-driven record types.
//!
//! Tables are not known at compile time, so rows and payloads are carried as
//! ordered `(column, value)` pairs over a small tagged scalar type instead of
//! per-table structs.

use crate::error::{BridgeError, BridgeResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// UTC wall-clock time for columns that store no zone
    NaiveTimestamp(NaiveDateTime),
}

impl RecordValue {
    /// Convert a JSON value from a request body.
    ///
    /// Strings stay strings; the database coerces them on assignment.
    pub fn from_json(column: &str, value: JsonValue) -> BridgeResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(b) => Ok(Self::Bool(b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(BridgeError::invalid_input(format!(
                        "Number for column '{}' is out of range",
                        column
                    )))
                }
            }
            JsonValue::String(s) => Ok(Self::String(s)),
            JsonValue::Array(_) | JsonValue::Object(_) => Err(BridgeError::invalid_input(
                format!("Column '{}' must be a scalar value", column),
            )),
        }
    }
}

impl From<i64> for RecordValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for RecordValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for RecordValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Caller-supplied column values for create/update/patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPayload {
    fields: Vec<(String, RecordValue)>,
}

impl RecordPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing an earlier value for the same column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: String, value: RecordValue) {
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Build a payload from a request body, which must be a JSON object.
    pub fn from_json(body: JsonValue) -> BridgeResult<Self> {
        let JsonValue::Object(map) = body else {
            return Err(BridgeError::invalid_input(
                "Request body must be a JSON object of column values",
            ));
        };

        let mut payload = Self::new();
        for (column, value) in map {
            let value = RecordValue::from_json(&column, value)?;
            payload.insert(column, value);
        }
        Ok(payload)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }
}

/// A row read back from a table, in catalog column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, RecordValue)>,
}

impl Record {
    pub fn from_fields(fields: Vec<(String, RecordValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&RecordValue> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
