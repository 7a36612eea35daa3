//! Statement-related data models.
//!
//! This module defines the scalar value domain, named parameters and the
//! uniform row shape returned by every statement execution.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Column name of the synthetic row returned by mutating statements.
pub const AFFECTED_ROWS_COLUMN: &str = "affected_rows";

/// A scalar value bound to a statement or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; MySQL DECIMAL columns decode as floats too.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Named statement parameters: placeholder name (without the leading `:`) to value.
pub type Params = HashMap<String, Value>;

/// One result record: column name to value, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the affected-row marker returned by mutating statements.
    pub fn affected_rows(count: u64) -> Self {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        Self {
            columns: vec![(AFFECTED_ROWS_COLUMN.to_string(), Value::Int(count))],
        }
    }

    /// Append a column. Later duplicates shadow nothing; `get` returns the first.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column_name)
            .map(|(_, value)| value)
    }

    /// Column names in select order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The count carried by an affected-row marker, if this row is one.
    pub fn affected_count(&self) -> Option<i64> {
        match self.columns.as_slice() {
            [(name, Value::Int(n))] if name == AFFECTED_ROWS_COLUMN => Some(*n),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert!(!Value::Int(0).is_null());
        assert_eq!(Value::Int(42).type_name(), "int");
        assert_eq!(Value::from("hello").type_name(), "text");
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Float(2.5));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Null.as_str(), None);
    }

    #[test]
    fn test_value_deserialize_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 1, 9.99, "a"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(1),
                Value::Float(9.99),
                Value::Text("a".to_string())
            ]
        );
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row: Row = [
            ("price", Value::Float(1.0)),
            ("id", Value::Int(1)),
            ("name", Value::from("a")),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.column_names(), vec!["price", "id", "name"]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"price":1.0,"id":1,"name":"a"}"#
        );
    }

    #[test]
    fn test_affected_rows_marker() {
        let row = Row::affected_rows(3);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get(AFFECTED_ROWS_COLUMN), Some(&Value::Int(3)));
        assert_eq!(row.affected_count(), Some(3));

        let mut plain = Row::new();
        plain.push("affected_rows", Value::Int(1));
        plain.push("other", Value::Null);
        assert_eq!(plain.affected_count(), None);
    }
}
