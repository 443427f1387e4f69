//! Column type inference
//!
//! Every column of an incoming dataset is scanned once, in full, and mapped to
//! exactly one [`ColumnType`]. Inference is total: values that fit no narrower
//! rule fall back to [`ColumnType::Text`], so it never errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use tabload_common::Value;

/// Storage type of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer32,
    Integer64,
    Float64,
    Boolean,
    Timestamp,
    Json,
    Text,
}

impl ColumnType {
    /// PostgreSQL type used when materializing the column
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer32 => "INTEGER",
            ColumnType::Integer64 => "BIGINT",
            ColumnType::Float64 => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Json => "JSONB",
            ColumnType::Text => "TEXT",
        }
    }

    /// The type's name as reported by `information_schema.columns.data_type`
    pub fn information_schema_name(self) -> &'static str {
        match self {
            ColumnType::Integer32 => "integer",
            ColumnType::Integer64 => "bigint",
            ColumnType::Float64 => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp without time zone",
            ColumnType::Json => "jsonb",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer32 => "integer32",
            ColumnType::Integer64 => "integer64",
            ColumnType::Float64 => "float64",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Infer the storage type of a column from all of its values.
///
/// Rules, first match wins, nulls ignored:
/// 1. all integers: `Integer32`, or `Integer64` once any value leaves the i32 range
/// 2. all numeric with at least one float: `Float64`
/// 3. all booleans: `Boolean`
/// 4. all timestamps: `Timestamp`
/// 5. any list or map present: `Json`
/// 6. otherwise (including an all-null column): `Text`
pub fn infer_column_type(values: &[Value]) -> ColumnType {
    let mut seen = false;
    let mut all_int = true;
    let mut all_numeric = true;
    let mut all_bool = true;
    let mut all_timestamp = true;
    let mut any_structured = false;
    let mut needs_64_bits = false;

    for value in values.iter().filter(|v| !v.is_null()) {
        seen = true;
        match value {
            Value::Int(i) => {
                all_bool = false;
                all_timestamp = false;
                if i32::try_from(*i).is_err() {
                    needs_64_bits = true;
                }
            },
            Value::Float(_) => {
                all_int = false;
                all_bool = false;
                all_timestamp = false;
            },
            Value::Bool(_) => {
                all_int = false;
                all_numeric = false;
                all_timestamp = false;
            },
            Value::Timestamp(_) => {
                all_int = false;
                all_numeric = false;
                all_bool = false;
            },
            Value::List(_) | Value::Map(_) => {
                any_structured = true;
                all_int = false;
                all_numeric = false;
                all_bool = false;
                all_timestamp = false;
            },
            Value::Text(_) | Value::Null => {
                all_int = false;
                all_numeric = false;
                all_bool = false;
                all_timestamp = false;
            },
        }
    }

    if !seen {
        return ColumnType::Text;
    }

    if all_int {
        if needs_64_bits {
            ColumnType::Integer64
        } else {
            ColumnType::Integer32
        }
    } else if all_numeric {
        ColumnType::Float64
    } else if all_bool {
        ColumnType::Boolean
    } else if all_timestamp {
        ColumnType::Timestamp
    } else if any_structured {
        ColumnType::Json
    } else {
        ColumnType::Text
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_integer_widening() {
        let mut column = ints(&[1, 2, 3]);
        assert_eq!(infer_column_type(&column), ColumnType::Integer32);

        column.push(Value::Int(2_147_483_648));
        assert_eq!(infer_column_type(&column), ColumnType::Integer64);
    }

    #[test]
    fn test_float_promotion() {
        let mut column = ints(&[1, 2, 3]);
        column.push(Value::Float(2.5));
        assert_eq!(infer_column_type(&column), ColumnType::Float64);
    }

    #[test]
    fn test_i32_bounds_are_inclusive() {
        let column = ints(&[i64::from(i32::MIN), i64::from(i32::MAX)]);
        assert_eq!(infer_column_type(&column), ColumnType::Integer32);
        let column = ints(&[i64::from(i32::MIN) - 1]);
        assert_eq!(infer_column_type(&column), ColumnType::Integer64);
    }

    #[test]
    fn test_all_null_is_text() {
        assert_eq!(infer_column_type(&[Value::Null, Value::Null]), ColumnType::Text);
        assert_eq!(infer_column_type(&[Value::Float(f64::NAN)]), ColumnType::Text);
        assert_eq!(infer_column_type(&[]), ColumnType::Text);
    }

    #[test]
    fn test_nulls_do_not_change_inference() {
        let column = vec![Value::Null, Value::Bool(true), Value::Float(f64::NAN), Value::Bool(false)];
        assert_eq!(infer_column_type(&column), ColumnType::Boolean);
    }

    #[test]
    fn test_booleans_are_not_numeric() {
        let column = vec![Value::Bool(true), Value::Int(1)];
        assert_eq!(infer_column_type(&column), ColumnType::Text);
    }

    #[test]
    fn test_timestamps() {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            infer_column_type(&[Value::Timestamp(ts), Value::Null]),
            ColumnType::Timestamp
        );
    }

    #[test]
    fn test_structured_column_is_json() {
        let column = vec![
            Value::from_json(json!({"level": "senior"})),
            Value::from_json(json!({"level": "junior"})),
        ];
        assert_eq!(infer_column_type(&column), ColumnType::Json);
    }

    #[test]
    fn test_mixed_structured_and_scalar_is_json() {
        let column = vec![Value::from_json(json!([1, 2])), Value::from("loose"), Value::Int(3)];
        assert_eq!(infer_column_type(&column), ColumnType::Json);
    }

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(ColumnType::Integer32.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Integer64.sql_type(), "BIGINT");
        assert_eq!(ColumnType::Float64.sql_type(), "DOUBLE PRECISION");
        assert_eq!(ColumnType::Boolean.sql_type(), "BOOLEAN");
        assert_eq!(ColumnType::Timestamp.sql_type(), "TIMESTAMP");
        assert_eq!(ColumnType::Json.sql_type(), "JSONB");
        assert_eq!(ColumnType::Text.sql_type(), "TEXT");
    }

    proptest! {
        #[test]
        fn prop_i32_values_infer_integer32(values in proptest::collection::vec(any::<i32>(), 1..50)) {
            let column: Vec<Value> = values.into_iter().map(Value::from).collect();
            prop_assert_eq!(infer_column_type(&column), ColumnType::Integer32);
        }

        #[test]
        fn prop_one_wide_value_forces_integer64(
            values in proptest::collection::vec(any::<i32>(), 0..50),
            wide in (i64::from(i32::MAX) + 1)..i64::MAX,
        ) {
            let mut column: Vec<Value> = values.into_iter().map(Value::from).collect();
            column.push(Value::Int(wide));
            prop_assert_eq!(infer_column_type(&column), ColumnType::Integer64);
        }

        #[test]
        fn prop_nulls_are_transparent(values in proptest::collection::vec(any::<i64>(), 1..30), nulls in 0usize..10) {
            let mut column: Vec<Value> = values.into_iter().map(Value::Int).collect();
            let expected = infer_column_type(&column);
            column.extend(std::iter::repeat(Value::Null).take(nulls));
            prop_assert_eq!(infer_column_type(&column), expected);
        }
    }
}
