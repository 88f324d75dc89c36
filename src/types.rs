use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

use crate::template::PlaceholderStyle;

/// Values that can be bound as query parameters or read back from a row.
///
/// Model code rarely names the variants; the `From` impls let a parameter map
/// take plain Rust values:
/// ```rust
/// use sql_connector::prelude::*;
///
/// let params = Params::new()
///     .with("id", 7_i64)
///     .with("name", "alice")
///     .with("deleted_at", None::<String>);
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Json(JsonValue),
    Blob(Vec<u8>),
    Null,
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in binding errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "bool",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Json(_) => "json",
            SqlValue::Blob(_) => "blob",
            SqlValue::Null => "null",
        }
    }

    /// Convert to a JSON value for decoding into serde types.
    ///
    /// Timestamps use chrono's own serde layout so they decode straight into
    /// `NaiveDateTime` fields.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => JsonValue::from(*f),
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Timestamp(dt) => {
                JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            SqlValue::Json(v) => v.clone(),
            SqlValue::Blob(bytes) => JsonValue::from(bytes.clone()),
            SqlValue::Null => JsonValue::Null,
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for SqlValue {
            fn from(value: $t) -> Self {
                SqlValue::Int(i64::from(value))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Float(f64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        SqlValue::Json(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// The backing store a connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl DatabaseType {
    /// Positional marker style the driver for this store expects.
    #[must_use]
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => PlaceholderStyle::Postgres,
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => PlaceholderStyle::Sqlite,
        }
    }
}
