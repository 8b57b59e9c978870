//! Encoding of dynamic values into storage scalars.

use serde_json::Value;

use crate::record::CardRecord;
use crate::schema::{Column, ColumnSource, PackFields, Schema};

/// One storable cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlScalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlScalar {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlScalar::Null)
    }
}

impl std::fmt::Display for SqlScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlScalar::Null => f.write_str("NULL"),
            SqlScalar::Integer(i) => write!(f, "{i}"),
            SqlScalar::Real(r) => write!(f, "{r}"),
            SqlScalar::Text(s) => f.write_str(s),
        }
    }
}

/// Encode one field value for `column`.
pub fn encode(value: Option<&Value>, column: &Column) -> SqlScalar {
    match value {
        None | Some(Value::Null) => SqlScalar::Null,
        Some(nested @ (Value::Array(_) | Value::Object(_))) => SqlScalar::Text(compact_json(nested)),
        Some(scalar) if column.drift => SqlScalar::Text(drift_text(scalar)),
        Some(Value::Bool(b)) => SqlScalar::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlScalar::Integer(i),
            None => SqlScalar::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Some(Value::String(s)) => SqlScalar::Text(s.clone()),
    }
}

/// Encode a record into one row, in schema column order.
pub fn encode_row(schema: &Schema, record: &CardRecord, pack: &PackFields) -> Vec<SqlScalar> {
    schema
        .columns()
        .iter()
        .map(|column| match column.source {
            ColumnSource::Field => encode(record.get(&column.name), column),
            ColumnSource::Derived(field) => pack
                .get(field)
                .map(|s| SqlScalar::Text(s.to_string()))
                .unwrap_or(SqlScalar::Null),
        })
        .collect()
}

/// Lists and mappings: no whitespace, non-ASCII kept, field order as
/// declared.
fn compact_json(value: &Value) -> String {
    // Serializing a `Value` cannot fail: all keys are strings.
    serde_json::to_string(value).unwrap_or_default()
}

/// Text form of a scalar in a column degraded by drift.
fn drift_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        // Integers in decimal, floats in shortest round-trip form ("60.0").
        Value::Number(n) => n.to_string(),
        other => compact_json(other),
    }
}
