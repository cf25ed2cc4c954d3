//! Column Mapper
//!
//! Pure, stateless translation between abstract field types and physical
//! SQLite column types, plus bidirectional value conversion.
//!
//! ## Type Table
//!
//! | Abstract              | Physical     |
//! |-----------------------|--------------|
//! | string                | TEXT         |
//! | number, integer       | NUMERIC      |
//! | boolean               | BOOLEAN      |
//! | date, timestamp       | TIMESTAMP    |
//! | array, object         | TEXT (JSON)  |
//! | anything else         | TEXT         |
//!
//! Null or absent input encodes to physical null and decodes back to JSON
//! null. Structured values serialize to text on write and parse on read; a
//! read-side parse failure is a [`DecodeError`] for that record, never an
//! abort of the whole page.
//!
//! Encode-time coercion failures (a boolean field handed `"maybe"`, say)
//! are immediate errors — the write stores nothing.

use crate::error::{Result, StoreError};
use recordhouse_core::{DecodeError, FieldSpec, FieldType};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row};

/// Physical column type behind one abstract field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Text,
    Numeric,
    Boolean,
    Timestamp,
    /// Opaque JSON blob, stored as text
    Structured,
}

impl PhysicalType {
    pub fn for_field(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::String => PhysicalType::Text,
            FieldType::Number | FieldType::Integer => PhysicalType::Numeric,
            FieldType::Boolean => PhysicalType::Boolean,
            FieldType::Date | FieldType::Timestamp => PhysicalType::Timestamp,
            FieldType::Array | FieldType::Object => PhysicalType::Structured,
            FieldType::Other(name) => {
                tracing::debug!(field_type = %name, "no physical mapping, falling back to TEXT");
                PhysicalType::Text
            }
        }
    }

    /// Column type for CREATE TABLE.
    pub fn sql(&self) -> &'static str {
        match self {
            PhysicalType::Text | PhysicalType::Structured => "TEXT",
            PhysicalType::Numeric => "NUMERIC",
            PhysicalType::Boolean => "BOOLEAN",
            PhysicalType::Timestamp => "TIMESTAMP",
        }
    }
}

/// A value ready to bind into a storage statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl ColumnValue {
    /// Bind this value as the next statement parameter.
    pub fn bind<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            ColumnValue::Null => query.bind(None::<String>),
            ColumnValue::Int(i) => query.bind(i),
            ColumnValue::Real(f) => query.bind(f),
            ColumnValue::Text(s) => query.bind(s),
        }
    }
}

/// Coerce one payload value to the physical form of its declared field.
pub fn encode(value: &Value, field: &FieldSpec) -> Result<ColumnValue> {
    if value.is_null() {
        return Ok(ColumnValue::Null);
    }

    let fail = |reason: &str| StoreError::Encode {
        field: field.name.clone(),
        field_type: field.field_type.name().to_string(),
        reason: reason.to_string(),
    };

    match PhysicalType::for_field(&field.field_type) {
        PhysicalType::Text => Ok(ColumnValue::Text(match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            // Structured value into a text field: keep the serialized form
            other => serde_json::to_string(other)?,
        })),

        PhysicalType::Numeric => match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ColumnValue::Int(i)),
                None => Ok(ColumnValue::Real(n.as_f64().ok_or_else(|| fail("not a finite number"))?)),
            },
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(ColumnValue::Real)
                .map_err(|_| fail("string is not numeric")),
            _ => Err(fail("expected a number")),
        },

        PhysicalType::Boolean => match value {
            Value::Bool(b) => Ok(ColumnValue::Int(*b as i64)),
            Value::Number(n) => Ok(ColumnValue::Int((n.as_f64().unwrap_or(0.0) != 0.0) as i64)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(ColumnValue::Int(1)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(ColumnValue::Int(0)),
            _ => Err(fail("expected a boolean")),
        },

        PhysicalType::Timestamp => match value {
            Value::String(s) => Ok(ColumnValue::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ColumnValue::Int(i)),
                None => Ok(ColumnValue::Real(n.as_f64().ok_or_else(|| fail("not a finite number"))?)),
            },
            _ => Err(fail("expected a timestamp string or epoch number")),
        },

        PhysicalType::Structured => Ok(ColumnValue::Text(serde_json::to_string(value)?)),
    }
}

/// Decode one column of a fetched row back into its logical value.
///
/// `index` is the column position within the row; `record_id` goes into the
/// per-record error so the caller can report which row was bad.
pub fn decode(
    row: &SqliteRow,
    index: usize,
    field: &FieldSpec,
    record_id: i64,
) -> std::result::Result<Value, DecodeError> {
    let fail = |reason: String| DecodeError {
        record_id,
        field: field.name.clone(),
        reason,
    };

    match PhysicalType::for_field(&field.field_type) {
        PhysicalType::Text | PhysicalType::Timestamp => {
            let v: Option<String> = row.try_get(index).map_err(|e| fail(e.to_string()))?;
            Ok(v.map(Value::String).unwrap_or(Value::Null))
        }

        PhysicalType::Numeric => {
            let v: Option<f64> = row.try_get(index).map_err(|e| fail(e.to_string()))?;
            Ok(match v {
                Some(n) => serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            })
        }

        PhysicalType::Boolean => {
            let v: Option<i64> = row.try_get(index).map_err(|e| fail(e.to_string()))?;
            Ok(v.map(|i| Value::Bool(i != 0)).unwrap_or(Value::Null))
        }

        PhysicalType::Structured => {
            let v: Option<String> = row.try_get(index).map_err(|e| fail(e.to_string()))?;
            match v {
                Some(text) => serde_json::from_str(&text).map_err(|e| fail(e.to_string())),
                None => Ok(Value::Null),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(field_type: FieldType) -> FieldSpec {
        FieldSpec::new("f", field_type)
    }

    #[test]
    fn physical_type_table() {
        assert_eq!(PhysicalType::for_field(&FieldType::String).sql(), "TEXT");
        assert_eq!(PhysicalType::for_field(&FieldType::Number).sql(), "NUMERIC");
        assert_eq!(PhysicalType::for_field(&FieldType::Integer).sql(), "NUMERIC");
        assert_eq!(PhysicalType::for_field(&FieldType::Boolean).sql(), "BOOLEAN");
        assert_eq!(PhysicalType::for_field(&FieldType::Date).sql(), "TIMESTAMP");
        assert_eq!(PhysicalType::for_field(&FieldType::Array).sql(), "TEXT");
        assert_eq!(
            PhysicalType::for_field(&FieldType::Other("uuid".into())).sql(),
            "TEXT"
        );
    }

    #[test]
    fn null_encodes_to_physical_null() {
        let v = encode(&Value::Null, &field(FieldType::Number)).unwrap();
        assert_eq!(v, ColumnValue::Null);
    }

    #[test]
    fn numbers_keep_integer_form_when_possible() {
        assert_eq!(
            encode(&json!(42), &field(FieldType::Integer)).unwrap(),
            ColumnValue::Int(42)
        );
        assert_eq!(
            encode(&json!(25.5), &field(FieldType::Number)).unwrap(),
            ColumnValue::Real(25.5)
        );
    }

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(
            encode(&json!("25.5"), &field(FieldType::Number)).unwrap(),
            ColumnValue::Real(25.5)
        );
        assert!(matches!(
            encode(&json!("warm"), &field(FieldType::Number)),
            Err(StoreError::Encode { .. })
        ));
    }

    #[test]
    fn booleans_coerce() {
        assert_eq!(
            encode(&json!(true), &field(FieldType::Boolean)).unwrap(),
            ColumnValue::Int(1)
        );
        assert_eq!(
            encode(&json!("FALSE"), &field(FieldType::Boolean)).unwrap(),
            ColumnValue::Int(0)
        );
        assert!(encode(&json!("maybe"), &field(FieldType::Boolean)).is_err());
    }

    #[test]
    fn structured_serializes_to_text() {
        let v = encode(&json!({"a": [1, 2]}), &field(FieldType::Object)).unwrap();
        assert_eq!(v, ColumnValue::Text("{\"a\":[1,2]}".to_string()));
    }

    #[test]
    fn scalars_into_text_fields_render_literally() {
        assert_eq!(
            encode(&json!(7), &field(FieldType::String)).unwrap(),
            ColumnValue::Text("7".to_string())
        );
        assert_eq!(
            encode(&json!(true), &field(FieldType::Other("uuid".into()))).unwrap(),
            ColumnValue::Text("true".to_string())
        );
    }
}
