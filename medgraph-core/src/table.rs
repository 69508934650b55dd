//! Row data carried by node tables.
//!
//! A [`Table`] is a small column-oriented frame: named columns and rows of JSON
//! values. Stages build tables, node tables validate them, and the
//! materializer projects them into bound row records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::SchemaViolation;

/// One bound row as sent to a store: column name → value.
pub type Record = Map<String, Value>;

/// Named columns and rows of values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table and fill it, rejecting rows of the wrong width.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self, SchemaViolation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row. Values are positional, in column order.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), SchemaViolation> {
        if row.len() != self.columns.len() {
            return Err(SchemaViolation::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Value at (`row`, `column`), if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Row indices whose `column` equals `value`.
    pub fn rows_where(&self, column: &str, value: &Value) -> Vec<usize> {
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| &r[idx] == value)
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Keep the first row for every distinct value of `column`.
    pub fn dedup_by(&self, rows: &[usize], column: &str) -> Vec<usize> {
        let Some(idx) = self.column_index(column) else {
            return rows.to_vec();
        };
        let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
        rows.iter()
            .copied()
            .filter(|&i| seen.insert(self.rows[i][idx].to_string()))
            .collect()
    }

    /// Project the given rows onto `columns`, producing bound records.
    ///
    /// Columns missing from the table are skipped.
    pub fn records(&self, rows: &[usize], columns: &[&str]) -> Vec<Record> {
        let indices: Vec<(&str, usize)> = columns
            .iter()
            .filter_map(|c| self.column_index(c).map(|i| (*c, i)))
            .collect();

        rows.iter()
            .filter_map(|&r| self.rows.get(r))
            .map(|row| {
                indices
                    .iter()
                    .map(|(name, i)| (name.to_string(), row[*i].clone()))
                    .collect()
            })
            .collect()
    }

    /// Count occurrences of each value in `column`, most frequent first.
    ///
    /// Ties keep first-seen order.
    pub fn value_counts(&self, column: &str, rows: &[usize]) -> Vec<(Value, usize)> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        let mut counts: Vec<(Value, usize)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for &r in rows {
            let value = &self.rows[r][idx];
            let key = value.to_string();
            match positions.get(&key) {
                Some(&p) => counts[p].1 += 1,
                None => {
                    positions.insert(key, counts.len());
                    counts.push((value.clone(), 1));
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// Plain-text form of a value as stores key it: strings unquoted, everything
/// else in its JSON form.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
