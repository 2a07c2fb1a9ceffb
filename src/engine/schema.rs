use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::EngineError;

/// Column types understood by the engine's table writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    DateTime,
    String,
    Double,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::DateTime => write!(f, "datetime"),
            DataType::String => write!(f, "string"),
            DataType::Double => write!(f, "double"),
        }
    }
}

/// A single typed cell of a row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    DateTime(DateTime<Utc>),
    String(String),
    Double(f64),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::DateTime(_) => DataType::DateTime,
            Value::String(_) => DataType::String,
            Value::Double(_) => DataType::Double,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// JSON encoding used on the wire; datetimes travel as epoch millis
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::DateTime(dt) => serde_json::json!(dt.timestamp_millis()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Double(v) => serde_json::json!(v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

/// One row, ordered by the table's columns
pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Fixed column layout of an append-only table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column to the schema
    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Check arity and per-column types of a row
    pub fn validate(&self, row: &Row) -> Result<(), EngineError> {
        if row.len() != self.columns.len() {
            return Err(EngineError::SchemaMismatch {
                table: self.name.clone(),
                reason: format!(
                    "expected {} values, got {}",
                    self.columns.len(),
                    row.len()
                ),
            });
        }

        for (column, value) in self.columns.iter().zip(row) {
            if value.data_type() != column.data_type {
                return Err(EngineError::SchemaMismatch {
                    table: self.name.clone(),
                    reason: format!(
                        "column '{}' expects {}, got {}",
                        column.name,
                        column.data_type,
                        value.data_type()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Encode a row as a `{column: value}` JSON object
    pub fn row_to_json(&self, row: &Row) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .zip(row)
            .map(|(column, value)| (column.name.clone(), value.to_json()))
            .collect()
    }
}
