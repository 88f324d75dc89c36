//! Decoding result sets into caller types.
//!
//! Two row shapes are supported, chosen explicitly with [`DecodeMode`]:
//!
//! - [`DecodeMode::Columns`]: each row's named columns map onto the fields of the
//!   destination type.
//! - [`DecodeMode::Json`]: the query returns a single column holding a JSON
//!   document (or an array of documents). Aggregates with nested objects are far
//!   easier to express this way than as flat columns.
//!
//! Destinations are any `serde::de::DeserializeOwned` type.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::ConnectorError;
use crate::results::{ResultSet, Row};
use crate::types::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Columns,
    Json,
}

/// Decode exactly one result.
///
/// # Errors
/// [`ConnectorError::NoRows`] when the set is empty (or the JSON column is SQL
/// `NULL`), [`ConnectorError::Decode`] on a shape mismatch.
pub fn scan_one<T: DeserializeOwned>(rs: &ResultSet, mode: DecodeMode) -> Result<T, ConnectorError> {
    scan_optional(rs, mode)?.ok_or(ConnectorError::NoRows)
}

/// Decode the first result, if any.
///
/// # Errors
/// [`ConnectorError::Decode`] on a shape mismatch.
pub fn scan_optional<T: DeserializeOwned>(
    rs: &ResultSet,
    mode: DecodeMode,
) -> Result<Option<T>, ConnectorError> {
    let Some(row) = rs.first() else {
        return Ok(None);
    };
    match mode {
        DecodeMode::Columns => decode(row.to_json_object()).map(Some),
        DecodeMode::Json => match json_document(row)? {
            JsonValue::Null => Ok(None),
            doc => decode(doc).map(Some),
        },
    }
}

/// Decode every result. Nothing matching is an empty `Vec`, not an error.
///
/// In [`DecodeMode::Json`] the first row's column must hold a JSON array; a SQL
/// `NULL` there also counts as empty.
///
/// # Errors
/// [`ConnectorError::Decode`] on a shape mismatch.
pub fn scan_all<T: DeserializeOwned>(rs: &ResultSet, mode: DecodeMode) -> Result<Vec<T>, ConnectorError> {
    match mode {
        DecodeMode::Columns => rs
            .rows()
            .iter()
            .map(|row| decode(row.to_json_object()))
            .collect(),
        DecodeMode::Json => {
            let Some(row) = rs.first() else {
                return Ok(Vec::new());
            };
            match json_document(row)? {
                JsonValue::Null => Ok(Vec::new()),
                doc @ JsonValue::Array(_) => decode(doc),
                other => Err(ConnectorError::Decode(format!(
                    "expected a JSON array, found {}",
                    json_kind(&other)
                ))),
            }
        }
    }
}

/// Decode the first column of the first row, e.g. a `count(*)`.
///
/// # Errors
/// [`ConnectorError::NoRows`] when the set is empty, [`ConnectorError::Decode`]
/// when the value does not fit `T`.
pub fn scan_scalar<T: DeserializeOwned>(rs: &ResultSet) -> Result<T, ConnectorError> {
    let row = rs.first().ok_or(ConnectorError::NoRows)?;
    let value = row
        .get_by_index(0)
        .ok_or_else(|| ConnectorError::Decode("result has no columns".into()))?;
    decode(value.to_json())
}

fn json_document(row: &Row) -> Result<JsonValue, ConnectorError> {
    if row.len() != 1 {
        return Err(ConnectorError::Decode(format!(
            "JSON scan needs exactly one column, query returned {}",
            row.len()
        )));
    }
    match &row.values()[0] {
        SqlValue::Json(doc) => Ok(doc.clone()),
        SqlValue::Text(text) => Ok(serde_json::from_str(text)?),
        SqlValue::Null => Ok(JsonValue::Null),
        other => Err(ConnectorError::Decode(format!(
            "JSON scan expected a json or text column, found {other:?}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(value: JsonValue) -> Result<T, ConnectorError> {
    serde_json::from_value(value).map_err(|e| ConnectorError::Decode(e.to_string()))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
