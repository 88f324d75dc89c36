use std::collections::HashMap;
use std::sync::Arc;

use super::row::Row;
use crate::types::SqlValue;

/// Rows returned by a query, materialized.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self::with_capacity(columns, 0)
    }

    #[must_use]
    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            rows: Vec::with_capacity(capacity),
            columns: Arc::new(columns),
            index: Arc::new(index),
        }
    }

    pub fn push_row(&mut self, values: Vec<SqlValue>) {
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            index: Arc::clone(&self.index),
            values,
        });
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
