//! Column profiling and dataset summaries.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use tradescout_shared::Result;

use crate::clean::parse_number;
use crate::{ColumnKind, Dataset, Value};

/// Default cap for [`Dataset::unique_values`].
pub const DEFAULT_UNIQUE_CAP: usize = 10_000;

/// Per-column profile shown on the data page.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub non_null: usize,
    pub null_count: usize,
    pub unique_count: usize,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Whole-dataset summary.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub size_mb: f64,
    pub null_counts: Vec<(String, usize)>,
    pub duplicate_rows: usize,
}

/// Problems found by [`Dataset::validate`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Dataset {
    pub fn column_info(&self) -> Vec<ColumnInfo> {
        (0..self.column_count())
            .map(|idx| {
                let non_null: Vec<&Value> =
                    self.column_values(idx).filter(|v| !v.is_null()).collect();
                let unique: HashSet<String> = non_null.iter().map(|v| v.hash_key()).collect();
                ColumnInfo {
                    name: self.columns[idx].clone(),
                    kind: self.kinds[idx],
                    non_null: non_null.len(),
                    null_count: self.row_count() - non_null.len(),
                    unique_count: unique.len(),
                    samples: non_null.iter().take(3).map(|v| v.to_string()).collect(),
                }
            })
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::Numeric)
    }

    pub fn text_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::Text)
    }

    fn columns_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == kind)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    /// Distinct non-null values, sorted, stringified, at most `max`.
    pub fn unique_values(&self, column: &str, max: usize) -> Result<Vec<String>> {
        let idx = self.require_column(column)?;
        let mut seen = HashSet::new();
        let mut values: Vec<&Value> = self
            .column_values(idx)
            .filter(|v| !v.is_null() && seen.insert(v.hash_key()))
            .collect();
        values.sort_by(|a, b| a.sort_cmp(b));
        Ok(values.into_iter().take(max).map(|v| v.to_string()).collect())
    }

    /// Every column with at least one non-null value.
    pub fn filterable_columns(&self) -> Vec<&str> {
        (0..self.column_count())
            .filter(|&idx| self.column_values(idx).any(|v| !v.is_null()))
            .map(|idx| self.columns[idx].as_str())
            .collect()
    }

    /// Most frequent non-null values, ties in first-seen order.
    pub fn value_counts(&self, column: &str, top: usize) -> Result<Vec<(String, usize)>> {
        let idx = self.require_column(column)?;
        let mut order: Vec<(String, String)> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in self.column_values(idx).filter(|v| !v.is_null()) {
            let key = value.hash_key();
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push((key, value.to_string()));
            }
            *count += 1;
        }
        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|(key, label)| (label, counts[&key]))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(top);
        Ok(ranked)
    }

    pub fn numeric_stats(&self, column: &str) -> Result<Option<NumericStats>> {
        let idx = self.require_column(column)?;
        let nums: Vec<f64> = self.column_values(idx).filter_map(Value::as_f64).collect();
        if nums.is_empty() {
            return Ok(None);
        }
        let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
        let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = nums.iter().sum::<f64>() / nums.len() as f64;
        Ok(Some(NumericStats {
            count: nums.len(),
            min,
            max,
            mean,
        }))
    }

    /// Rows identical to an earlier row.
    pub fn duplicate_rows(&self) -> usize {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|row| {
                let key: Vec<String> = row.iter().map(Value::hash_key).collect();
                !seen.insert(key)
            })
            .count()
    }

    /// Rough in-memory footprint in bytes.
    pub fn estimated_size_bytes(&self) -> u64 {
        let header: usize = self.columns.iter().map(String::len).sum();
        let cells: usize = self
            .rows
            .iter()
            .flatten()
            .map(|v| match v {
                Value::Null => 8,
                Value::Number(_) => 8,
                Value::Text(s) => 24 + s.len(),
            })
            .sum();
        (header + cells) as u64
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            rows: self.row_count(),
            columns: self.column_count(),
            size_mb: self.estimated_size_bytes() as f64 / (1024.0 * 1024.0),
            null_counts: self
                .column_info()
                .into_iter()
                .map(|c| (c.name, c.null_count))
                .collect(),
            duplicate_rows: self.duplicate_rows(),
        }
    }

    /// Flag empty data and text columns whose first ten values mix numbers
    /// with words.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        if self.is_empty() {
            report.issues.push("Dataset is empty".into());
            return report;
        }
        if self.column_count() == 0 {
            report.issues.push("Dataset has no columns".into());
        }

        for idx in 0..self.column_count() {
            if self.kinds[idx] != ColumnKind::Text {
                continue;
            }
            let sample: Vec<&Value> = self
                .column_values(idx)
                .filter(|v| !v.is_null())
                .take(10)
                .collect();
            let numbers = sample
                .iter()
                .filter(|v| match v {
                    Value::Number(_) => true,
                    Value::Text(s) => parse_number(s).is_some(),
                    Value::Null => false,
                })
                .count();
            if numbers > 0 && numbers < sample.len() {
                report
                    .issues
                    .push(format!("Column '{}' has mixed data types", self.columns[idx]));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade() -> Dataset {
        let mut ds = Dataset::from_csv_bytes(
            b"Company,City,Value,Code\n\
              Acme,Pune,100,A1\n\
              Beta,Delhi,250,7\n\
              Acme,Pune,100,A1\n\
              Gamma,,50,B2\n",
        )
        .unwrap();
        ds.clean();
        ds
    }

    #[test]
    fn column_info_counts() {
        let info = trade().column_info();
        let city = &info[1];
        assert_eq!(city.null_count, 1);
        assert_eq!(city.unique_count, 2);
        assert_eq!(city.samples, vec!["Pune", "Delhi", "Pune"]);
        assert_eq!(info[2].kind, ColumnKind::Numeric);
    }

    #[test]
    fn unique_values_sorted_and_capped() {
        let ds = trade();
        assert_eq!(
            ds.unique_values("Company", 10).unwrap(),
            vec!["Acme", "Beta", "Gamma"]
        );
        assert_eq!(ds.unique_values("Value", 2).unwrap(), vec!["50", "100"]);
    }

    #[test]
    fn value_counts_rank_by_frequency() {
        let counts = trade().value_counts("Company", 10).unwrap();
        assert_eq!(counts[0], ("Acme".to_string(), 2));
        assert_eq!(counts[1], ("Beta".to_string(), 1));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn duplicates_and_info() {
        let ds = trade();
        assert_eq!(ds.duplicate_rows(), 1);
        let info = ds.info();
        assert_eq!(info.rows, 4);
        assert_eq!(info.columns, 4);
        assert!(info.size_mb > 0.0);
    }

    #[test]
    fn numeric_stats_summarise() {
        let stats = trade().numeric_stats("Value").unwrap().unwrap();
        assert_eq!(stats.min, 50.0);
        assert_eq!(stats.max, 250.0);
        assert_eq!(stats.mean, 125.0);
        assert!(trade().numeric_stats("Company").unwrap().is_none());
    }

    #[test]
    fn filterable_columns_skip_all_null() {
        let mut ds = trade();
        ds.add_column("Empty", Value::Null);
        assert!(!ds.filterable_columns().contains(&"Empty"));
        assert!(ds.filterable_columns().contains(&"City"));
    }

    #[test]
    fn validate_flags_mixed_columns() {
        let report = trade().validate();
        assert!(!report.is_valid());
        assert_eq!(report.issues, vec!["Column 'Code' has mixed data types"]);
        assert!(!Dataset::default().validate().is_valid());
    }
}
