use rusqlite::types::Value;

use crate::types::SqlValue;

/// Convert a single [`SqlValue`] into an owned `rusqlite` value.
///
/// `SQLite` has no boolean, timestamp or JSON storage class: booleans become
/// `0`/`1`, timestamps ISO-8601 text and JSON its serialized text. Timestamps
/// use the `T` separator so they sort with the `strftime` column defaults and
/// decode back into `NaiveDateTime`.
#[must_use]
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        SqlValue::Json(v) => Value::Text(v.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        SqlValue::Null => Value::Null,
    }
}

/// Convert positional arguments for binding against `?N` markers.
#[must_use]
pub fn convert_args(args: &[SqlValue]) -> Vec<Value> {
    args.iter().map(to_sqlite_value).collect()
}

/// Read a column back into a [`SqlValue`].
#[must_use]
pub fn from_sqlite_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_and_json_are_stored_as_integers_and_text() {
        assert_eq!(to_sqlite_value(&SqlValue::Bool(true)), Value::Integer(1));
        assert_eq!(
            to_sqlite_value(&SqlValue::Json(serde_json::json!({"a": 1}))),
            Value::Text(r#"{"a":1}"#.into())
        );
        assert_eq!(from_sqlite_value(Value::Real(1.5)), SqlValue::Float(1.5));
    }

    #[test]
    fn timestamps_are_written_in_the_decodable_layout() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_milli_opt(9, 30, 5, 250))
            .unwrap();
        let Value::Text(text) = to_sqlite_value(&SqlValue::Timestamp(dt)) else {
            panic!("timestamp should be stored as text");
        };
        assert_eq!(text, "2024-03-01T09:30:05.250");
        let back: chrono::NaiveDateTime =
            serde_json::from_value(serde_json::Value::String(text)).unwrap();
        assert_eq!(back, dt);
    }
}
