//! Value canonicalization
//!
//! Converts in-memory [`Value`]s into [`SqlValue`]s, the typed values the
//! storage layer binds. The same conversion backs row identity: two rows are
//! equal when their canonical forms are equal, which is what [`RowKey`] hashes.

use crate::inference::ColumnType;
use chrono::{NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use tabload_common::{Dataset, Value};

/// A persistable value. Every variant carries an `Option` so nulls stay typed.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int4(Option<i32>),
    Int8(Option<i64>),
    Float8(Option<f64>),
    Bool(Option<bool>),
    Timestamp(Option<NaiveDateTime>),
    Json(Option<serde_json::Value>),
    Text(Option<String>),
}

impl SqlValue {
    /// The typed null of a column type
    pub fn null(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Integer32 => SqlValue::Int4(None),
            ColumnType::Integer64 => SqlValue::Int8(None),
            ColumnType::Float64 => SqlValue::Float8(None),
            ColumnType::Boolean => SqlValue::Bool(None),
            ColumnType::Timestamp => SqlValue::Timestamp(None),
            ColumnType::Json => SqlValue::Json(None),
            ColumnType::Text => SqlValue::Text(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Int4(v) => v.is_none(),
            SqlValue::Int8(v) => v.is_none(),
            SqlValue::Float8(v) => v.is_none(),
            SqlValue::Bool(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
            SqlValue::Json(v) => v.is_none(),
            SqlValue::Text(v) => v.is_none(),
        }
    }

    /// The column type this value binds as
    pub fn column_type(&self) -> ColumnType {
        match self {
            SqlValue::Int4(_) => ColumnType::Integer32,
            SqlValue::Int8(_) => ColumnType::Integer64,
            SqlValue::Float8(_) => ColumnType::Float64,
            SqlValue::Bool(_) => ColumnType::Boolean,
            SqlValue::Timestamp(_) => ColumnType::Timestamp,
            SqlValue::Json(_) => ColumnType::Json,
            SqlValue::Text(_) => ColumnType::Text,
        }
    }

    /// Back to the in-memory model, as a read from storage would produce it
    pub fn to_value(&self) -> Value {
        match self {
            SqlValue::Int4(v) => Value::from(*v),
            SqlValue::Int8(v) => Value::from(*v),
            SqlValue::Float8(v) => Value::from(*v),
            SqlValue::Bool(v) => Value::from(*v),
            SqlValue::Timestamp(v) => Value::from(*v),
            SqlValue::Json(v) => v.clone().map(Value::from_json).unwrap_or(Value::Null),
            SqlValue::Text(v) => Value::from(v.clone()),
        }
    }
}

/// Canonicalize one value for a column of `column_type`.
///
/// Total over every pair. For values drawn from a column that inference typed
/// as `column_type` the result always binds as that type; any other value
/// (for instance a row read back from a table whose types drifted) degrades to
/// its text form so it can still be compared.
pub fn canonicalize(value: &Value, column_type: ColumnType) -> SqlValue {
    if value.is_null() {
        return SqlValue::null(column_type);
    }

    match (column_type, value) {
        (ColumnType::Integer32, Value::Int(i)) => match i32::try_from(*i) {
            Ok(v) => SqlValue::Int4(Some(v)),
            Err(_) => text(value),
        },
        (ColumnType::Integer32, Value::Float(f)) if is_integral_within(*f, i32::MIN.into(), i32::MAX.into()) => {
            SqlValue::Int4(Some(*f as i32))
        },
        (ColumnType::Integer64, Value::Int(i)) => SqlValue::Int8(Some(*i)),
        (ColumnType::Integer64, Value::Float(f)) if is_integral_within(*f, I64_MIN_F64, I64_MAX_F64) => {
            SqlValue::Int8(Some(*f as i64))
        },
        (ColumnType::Float64, Value::Int(i)) => SqlValue::Float8(Some(*i as f64)),
        (ColumnType::Float64, Value::Float(f)) => SqlValue::Float8(Some(*f)),
        (ColumnType::Boolean, Value::Bool(b)) => SqlValue::Bool(Some(*b)),
        (ColumnType::Timestamp, Value::Timestamp(ts)) => SqlValue::Timestamp(Some(truncate_to_micros(*ts))),
        (ColumnType::Json, Value::List(_) | Value::Map(_)) => SqlValue::Json(Some(value.to_json())),
        // Scalars in a JSON column pass through as their text, stored as a JSON string
        (ColumnType::Json, _) => SqlValue::Json(Some(serde_json::Value::String(value.to_string()))),
        _ => text(value),
    }
}

/// i64 bounds as floats; the upper one is the largest f64 below 2^63
const I64_MIN_F64: f64 = -9.223_372_036_854_776e18;
const I64_MAX_F64: f64 = 9.223_372_036_854_775e18;

fn text(value: &Value) -> SqlValue {
    SqlValue::Text(Some(value.to_string()))
}

fn is_integral_within(f: f64, min: f64, max: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= min && f <= max
}

/// Storage keeps microseconds; anything finer would not survive a round trip.
fn truncate_to_micros(ts: NaiveDateTime) -> NaiveDateTime {
    let micros = ts.nanosecond() / 1_000 * 1_000;
    ts.with_nanosecond(micros).unwrap_or(ts)
}

/// Canonicalize a row given the column types in row order
pub fn canonicalize_row(row: &[&Value], types: &[ColumnType]) -> Vec<SqlValue> {
    row.iter()
        .zip(types)
        .map(|(value, column_type)| canonicalize(value, *column_type))
        .collect()
}

/// Canonicalize every row of a dataset whose columns line up with `types`
pub fn canonicalize_rows(dataset: &Dataset, types: &[ColumnType]) -> Vec<Vec<SqlValue>> {
    dataset
        .rows()
        .map(|row| canonicalize_row(&row, types))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Json(String),
    Text(String),
}

impl From<&SqlValue> for KeyPart {
    fn from(value: &SqlValue) -> Self {
        match value {
            v if v.is_null() => KeyPart::Null,
            SqlValue::Int4(Some(i)) => KeyPart::Int((*i).into()),
            SqlValue::Int8(Some(i)) => KeyPart::Int(*i),
            // -0.0 == 0.0 as values, so they must hash alike
            SqlValue::Float8(Some(f)) if *f == 0.0 => KeyPart::Float(0.0f64.to_bits()),
            SqlValue::Float8(Some(f)) => KeyPart::Float(f.to_bits()),
            SqlValue::Bool(Some(b)) => KeyPart::Bool(*b),
            SqlValue::Timestamp(Some(ts)) => KeyPart::Timestamp(*ts),
            SqlValue::Json(Some(j)) => KeyPart::Json(numeric_identity(j).to_string()),
            SqlValue::Text(Some(s)) => KeyPart::Text(s.clone()),
            _ => KeyPart::Null,
        }
    }
}

/// Rewrite integral floats that fit in i64 as integers, recursively, with
/// object keys in sorted order.
///
/// JSONB compares numbers by value and prints `1e16` back as
/// `10000000000000000`, so `1.0` and `1` must key alike.
fn numeric_identity(json: &serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if is_integral_within(f, I64_MIN_F64, I64_MAX_F64) => serde_json::Value::from(f as i64),
            _ => json.clone(),
        },
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(numeric_identity).collect()),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), numeric_identity(v)))
                .collect::<BTreeMap<_, _>>()
                .into_iter()
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Identity of a row for diffing: structural equality over every column,
/// with null equal to null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(Vec<KeyPart>);

impl RowKey {
    pub fn from_canonical(values: &[SqlValue]) -> Self {
        Self(values.iter().map(KeyPart::from).collect())
    }

    /// Key of a raw row, canonicalized with the given column types
    pub fn from_row(row: &[&Value], types: &[ColumnType]) -> Self {
        Self(
            row.iter()
                .zip(types)
                .map(|(value, column_type)| KeyPart::from(&canonicalize(value, *column_type)))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_nulls_are_typed() {
        for column_type in [
            ColumnType::Integer32,
            ColumnType::Integer64,
            ColumnType::Float64,
            ColumnType::Boolean,
            ColumnType::Timestamp,
            ColumnType::Json,
            ColumnType::Text,
        ] {
            let canonical = canonicalize(&Value::Null, column_type);
            assert!(canonical.is_null());
            assert_eq!(canonical.column_type(), column_type);
        }
        assert_eq!(
            canonicalize(&Value::Float(f64::NAN), ColumnType::Float64),
            SqlValue::Float8(None)
        );
    }

    #[test]
    fn test_numeric_reduction() {
        assert_eq!(canonicalize(&Value::Int(7), ColumnType::Integer32), SqlValue::Int4(Some(7)));
        assert_eq!(canonicalize(&Value::Int(7), ColumnType::Integer64), SqlValue::Int8(Some(7)));
        assert_eq!(canonicalize(&Value::Int(7), ColumnType::Float64), SqlValue::Float8(Some(7.0)));
        assert_eq!(canonicalize(&Value::Float(2.5), ColumnType::Float64), SqlValue::Float8(Some(2.5)));
        assert_eq!(canonicalize(&Value::Bool(true), ColumnType::Boolean), SqlValue::Bool(Some(true)));
    }

    #[test]
    fn test_structured_values_serialize_to_json() {
        let senior = Value::from_json(json!({"level": "senior"}));
        assert_eq!(
            canonicalize(&senior, ColumnType::Json),
            SqlValue::Json(Some(json!({"level": "senior"})))
        );

        let SqlValue::Text(Some(text)) = canonicalize(&senior, ColumnType::Text) else {
            panic!("structured value in a text column must become text");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"level": "senior"}));
    }

    #[test]
    fn test_scalar_in_json_column_passes_through_as_text() {
        assert_eq!(
            canonicalize(&Value::from("plain"), ColumnType::Json),
            SqlValue::Json(Some(json!("plain")))
        );
        assert_eq!(
            canonicalize(&Value::Int(5), ColumnType::Json),
            SqlValue::Json(Some(json!("5")))
        );
    }

    #[test]
    fn test_text_column_accepts_anything() {
        let ts = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            canonicalize(&Value::Timestamp(ts), ColumnType::Text),
            SqlValue::Text(Some("2022-03-01 00:00:00".to_string()))
        );
        assert_eq!(
            canonicalize(&Value::Bool(false), ColumnType::Text),
            SqlValue::Text(Some("false".to_string()))
        );
    }

    #[test]
    fn test_mismatched_values_degrade_to_text() {
        assert_eq!(
            canonicalize(&Value::Int(3_000_000_000), ColumnType::Integer32),
            SqlValue::Text(Some("3000000000".to_string()))
        );
        assert_eq!(
            canonicalize(&Value::from("x"), ColumnType::Boolean),
            SqlValue::Text(Some("x".to_string()))
        );
        assert_eq!(canonicalize(&Value::Float(4.0), ColumnType::Integer32), SqlValue::Int4(Some(4)));
    }

    #[test]
    fn test_timestamps_truncate_to_micros() {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_nano_opt(12, 0, 0, 123_456_789)
            .unwrap();
        let SqlValue::Timestamp(Some(out)) = canonicalize(&Value::Timestamp(ts), ColumnType::Timestamp) else {
            panic!("expected a timestamp");
        };
        assert_eq!(out.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_round_trip_through_storage_form() {
        let original = Value::from_json(json!({"level": "junior", "years": 2}));
        let stored = canonicalize(&original, ColumnType::Json);
        assert_eq!(stored.to_value(), original);
    }

    #[test]
    fn test_row_key_equality() {
        let types = [ColumnType::Text, ColumnType::Integer32];
        let a = Value::from("A");
        let one = Value::Int(1);
        let null = Value::Null;

        assert_eq!(RowKey::from_row(&[&a, &one], &types), RowKey::from_row(&[&a, &one], &types));
        assert_ne!(RowKey::from_row(&[&a, &one], &types), RowKey::from_row(&[&a, &null], &types));
        assert_eq!(RowKey::from_row(&[&a, &null], &types), RowKey::from_row(&[&a, &null], &types));
    }

    #[test]
    fn test_json_row_key_compares_numbers_by_value() {
        let written = Value::from_json(json!({"x": 1e16, "tags": [2.0, 2.5]}));
        let read_back = Value::from_json(json!({"x": 10_000_000_000_000_000i64, "tags": [2, 2.5]}));
        let types = [ColumnType::Json];

        assert_eq!(RowKey::from_row(&[&written], &types), RowKey::from_row(&[&read_back], &types));
        assert_ne!(
            RowKey::from_row(&[&Value::from_json(json!({"x": 2.5}))], &types),
            RowKey::from_row(&[&Value::from_json(json!({"x": 2}))], &types)
        );
        // The stored document keeps the number as written
        assert_eq!(canonicalize(&written, ColumnType::Json), SqlValue::Json(Some(json!({"x": 1e16, "tags": [2.0, 2.5]}))));
    }

    #[test]
    fn test_row_key_ignores_integer_width_and_negative_zero() {
        assert_eq!(
            RowKey::from_canonical(&[SqlValue::Int4(Some(9))]),
            RowKey::from_canonical(&[SqlValue::Int8(Some(9))])
        );
        assert_eq!(
            RowKey::from_canonical(&[SqlValue::Float8(Some(-0.0))]),
            RowKey::from_canonical(&[SqlValue::Float8(Some(0.0))])
        );
        assert_eq!(
            RowKey::from_canonical(&[SqlValue::Text(None)]),
            RowKey::from_canonical(&[SqlValue::Int4(None)])
        );
    }
}
