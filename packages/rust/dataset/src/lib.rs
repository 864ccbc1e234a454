//! In-memory tabular datasets for TradeScout.
//!
//! A [`Dataset`] is a header row plus row-major cells. Cells are either null,
//! a number, or text; each column carries a [`ColumnKind`] decided by
//! [`Dataset::clean`]. Datasets serialize to JSON for storage and export to
//! CSV for download.

mod clean;
mod load;
mod profile;
pub mod sample;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use tradescout_shared::{Result, TradeScoutError};

pub use load::{FileType, detect_file_type, load_file};
pub use profile::{ColumnInfo, DEFAULT_UNIQUE_CAP, DatasetInfo, NumericStats, ValidationReport};

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting unique values: numbers, then text, then nulls.
    pub(crate) fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            (Value::Text(_), Value::Null) => Ordering::Less,
            (Value::Null, Value::Text(_)) => Ordering::Greater,
            (Value::Null, Value::Null) => Ordering::Equal,
        }
    }

    /// Key that distinguishes `1` (number) from `"1"` (text).
    pub(crate) fn hash_key(&self) -> String {
        match self {
            Value::Null => "\u{0}".to_string(),
            Value::Number(n) => format!("n:{n}"),
            Value::Text(s) => format!("t:{s}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Render whole numbers without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Column type after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => f.write_str("numeric"),
            ColumnKind::Text => f.write_str("text"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset from column names and rows. Rows are padded or
    /// truncated to the header width. A column is numeric when every
    /// non-null cell is a number.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        let kinds = vec![ColumnKind::Text; width];
        let mut ds = Self {
            columns,
            kinds,
            rows,
        };
        ds.refresh_kinds();
        ds
    }

    /// Build from string-keyed columns, as the sample datasets do.
    pub fn from_columns(columns: Vec<(&str, Vec<Value>)>) -> Self {
        let len = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let names = columns.iter().map(|(n, _)| (*n).to_string()).collect();
        let mut rows = vec![Vec::with_capacity(columns.len()); len];
        for (_, values) in &columns {
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(values.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        Self::new(names, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn kind(&self, column: usize) -> Option<ColumnKind> {
        self.kinds.get(column).copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column, or a dataset error naming it.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| TradeScoutError::dataset(format!("column '{name}' not found")))
    }

    /// First candidate present as an exact column name, in candidate order.
    pub fn find_column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates
            .iter()
            .copied()
            .find(|c| self.column_index(c).is_some())
    }

    pub fn first_text_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .zip(&self.kinds)
            .find(|(_, k)| **k == ColumnKind::Text)
            .map(|(c, _)| c.as_str())
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |r| r.get(column))
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// First `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Row indices whose cell in `column` displays as `value`.
    pub fn rows_where(&self, column: &str, value: &str) -> Result<Vec<usize>> {
        let idx = self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r[idx].is_null() && r[idx].to_string() == value)
            .map(|(i, _)| i)
            .collect())
    }

    /// Append a column filled with `fill`. An existing column of that name is
    /// left in place and its index returned.
    pub fn add_column(&mut self, name: &str, fill: Value) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        self.kinds.push(match fill {
            Value::Number(_) => ColumnKind::Numeric,
            _ => ColumnKind::Text,
        });
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self.columns.len() - 1
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Value) -> Result<()> {
        let rows = self.rows.len();
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| {
                TradeScoutError::dataset(format!(
                    "cell ({row}, {column}) out of range for {rows} rows"
                ))
            })?;
        *cell = value;
        Ok(())
    }

    /// Export as CSV with a header row. Nulls become empty strings.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|e| TradeScoutError::dataset(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|v| v.to_string()))
                .map_err(|e| TradeScoutError::dataset(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| TradeScoutError::dataset(e.to_string()))
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TradeScoutError::dataset(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TradeScoutError::parse(format!("stored dataset is corrupt: {e}")))
    }

    /// Mark a column numeric only when every non-null cell is a number.
    fn refresh_kinds(&mut self) {
        for (idx, kind) in self.kinds.iter_mut().enumerate() {
            let mut any = false;
            let all_numbers = self
                .rows
                .iter()
                .map(|r| &r[idx])
                .filter(|v| !v.is_null())
                .all(|v| {
                    any = true;
                    matches!(v, Value::Number(_))
                });
            *kind = if any && all_numbers {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            };
        }
    }
}
