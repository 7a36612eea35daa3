//! Driver row decoding.
//!
//! This module maps driver rows onto the uniform [`Row`] shape. Every column
//! value lands in the scalar domain `Null | Int | Float | Text`:
//!
//! 1. `categorize_type` classifies the driver type name into a `TypeCategory`
//! 2. Database-specific decoders extract the value for that category
//!
//! Values outside the scalar domain are widened: booleans become integers,
//! DECIMAL becomes a float (text if it does not fit), temporal values become
//! ISO-8601 text and binary values become base64 text.

use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, Row, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, backend: BackendKind) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity stores plain numbers
        if backend == BackendKind::EmbeddedSql {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") && !lower.contains("point") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if matches!(lower.as_str(), "date" | "time" | "datetime" | "timestamp") {
        return TypeCategory::Temporal;
    }

    TypeCategory::Text
}

/// Wrapper type for raw DECIMAL values as strings.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Encode bytes as base64 text.
pub fn encode_binary(bytes: &[u8]) -> Value {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    Value::Text(STANDARD.encode(bytes))
}

/// Convert a parsed DECIMAL to the scalar domain.
pub fn decimal_value(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::Text(raw.to_string()),
    }
}

/// Conversion from a driver row to the uniform row shape.
pub trait RowToValues {
    fn to_row(&self) -> DbResult<Row>;
}

impl RowToValues for SqliteRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                Ok::<_, DbError>((col.name().to_string(), sqlite::decode_column(self, idx)?))
            })
            .collect()
    }
}

impl RowToValues for MySqlRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), BackendKind::ClientServerSql);
                Ok::<_, DbError>((col.name().to_string(), mysql::decode_column(self, idx, category)?))
            })
            .collect()
    }
}

mod sqlite {
    use super::*;

    /// SQLite is dynamically typed, so the value's storage class decides,
    /// not the declared column type.
    pub fn decode_column(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let storage = raw.type_info().name().to_string();
        match categorize_type(&storage, BackendKind::EmbeddedSql) {
            TypeCategory::Integer | TypeCategory::Boolean => Ok(Value::Int(row.try_get(idx)?)),
            TypeCategory::Float | TypeCategory::Decimal => Ok(Value::Float(row.try_get(idx)?)),
            TypeCategory::Binary => Ok(encode_binary(&row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Temporal | TypeCategory::Text => Ok(Value::Text(row.try_get(idx)?)),
        }
    }
}

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> DbResult<Value> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(Value::Int(i64::from(row.try_get::<bool, _>(idx)?))),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Decimal => Ok(decimal_value(&row.try_get::<RawDecimal, _>(idx)?.0)),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => Ok(encode_binary(&row.try_get::<Vec<u8>, _>(idx)?)),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        let v = row.try_get::<u64, _>(idx)?;
        // BIGINT UNSIGNED above i64::MAX keeps its exact digits as text
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(v.to_string())))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(Value::Float(v));
        }
        Ok(Value::Float(f64::from(row.try_get::<f32, _>(idx)?)))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Ok(Value::Text(v.to_rfc3339()));
        }
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Ok(Value::Text(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Ok(Value::Text(v.format("%Y-%m-%d").to_string()));
        }
        row.try_get::<NaiveTime, _>(idx)
            .map(|v| Value::Text(v.format("%H:%M:%S%.f").to_string()))
            .map_err(|e| DbError::decode(format!("Unsupported temporal value in column {}: {}", idx, e)))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Ok(Value::Text(v));
        }
        // ENUM/SET/JSON and friends that the driver only hands out as bytes
        let bytes = row.try_get::<Vec<u8>, _>(idx)?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => encode_binary(e.as_bytes()),
        })
    }
}
