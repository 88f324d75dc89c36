use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::SqlValue;

/// One row of a query result.
///
/// Column names and the name-to-index lookup are shared by every row of the
/// owning [`ResultSet`](super::ResultSet).
#[derive(Debug, Clone)]
pub struct Row {
    pub(crate) columns: Arc<Vec<String>>,
    pub(crate) index: Arc<HashMap<String, usize>>,
    pub(crate) values: Vec<SqlValue>,
}

impl Row {
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.index.get(column).and_then(|&idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    /// The row as a JSON object keyed by column name.
    ///
    /// When a name repeats (e.g. `SELECT a.id, b.id`), the last column wins.
    #[must_use]
    pub fn to_json_object(&self) -> JsonValue {
        let mut map = Map::with_capacity(self.values.len());
        for (name, value) in self.columns.iter().zip(&self.values) {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }
}
