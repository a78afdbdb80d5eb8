//! Uniform tabular result handed back to callers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::RowSet;

/// Shape of a result, used to pick a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Exactly one row.
    Metric,
    /// Two or more rows.
    Table,
    /// No result set, or a result set without rows.
    Empty,
}

impl ResultKind {
    pub fn classify(returns_rows: bool, row_count: usize) -> Self {
        match (returns_rows, row_count) {
            (false, _) | (true, 0) => ResultKind::Empty,
            (true, 1) => ResultKind::Metric,
            _ => ResultKind::Table,
        }
    }
}

/// Every cell is already stringified; `rows[i][j]` belongs to `columns[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub kind: ResultKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            kind: ResultKind::Empty,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
        }
    }

    pub fn from_row_set(row_set: RowSet) -> Self {
        let rows: Vec<Vec<String>> = row_set
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        let row_count = rows.len();

        Self {
            kind: ResultKind::classify(row_set.returns_rows, row_count),
            columns: row_set.columns,
            rows,
            row_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row.
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first().map(String::as_str)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    /// Rows as column→value objects, at most `limit` of them.
    pub fn records(&self, limit: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), Value::String(value.clone())))
                    .collect()
            })
            .collect()
    }
}
