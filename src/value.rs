use serde::{Deserialize, Serialize};

use crate::error::{Result, UndoError};

/// A single SQL value: a bound statement parameter, a result column, or a
/// field of a captured row image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Varchar(String),
    Bytes(Vec<u8>),
}

/// One result row, columns in select-list order.
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form of a column. Drivers report numeric catalog columns either
    /// as integers or as strings, so both are accepted.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Varchar(v) => Some(v.clone()),
            Value::Bytes(v) => Some(String::from_utf8_lossy(v).into_owned()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(*v as i64),
            Value::Double(_) => None,
            Value::Varchar(v) => v.trim().parse().ok(),
            Value::Bytes(v) => std::str::from_utf8(v).ok()?.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(v) => Some(v),
            Value::Varchar(v) => Some(v.into_bytes()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

// Row accessors used when scanning catalog and undo log results.

pub(crate) fn column<'a>(row: &'a Row, idx: usize, name: &str) -> Result<&'a Value> {
    row.get(idx)
        .ok_or_else(|| UndoError::Decode(format!("missing column {name} at position {idx}")))
}

pub(crate) fn text(row: &Row, idx: usize, name: &str) -> Result<String> {
    column(row, idx, name)?
        .as_text()
        .ok_or_else(|| UndoError::Decode(format!("column {name} is NULL")))
}

pub(crate) fn opt_text(row: &Row, idx: usize, name: &str) -> Result<String> {
    Ok(column(row, idx, name)?.as_text().unwrap_or_default())
}
