//! Normalisation pass run after loading.

use tracing::debug;

use crate::{ColumnKind, Dataset, Value};

/// Cell text treated as missing.
const NULL_TOKENS: &[&str] = &["", "nan", "NaN", "None", "<NA>", "null", "NULL"];

/// Share of all rows that must parse as numbers to convert a column that
/// also holds non-numeric text.
const NUMERIC_THRESHOLD: f64 = 0.8;

impl Dataset {
    /// Replace null tokens, convert numeric text columns to numbers, and trim
    /// remaining text.
    ///
    /// A column converts when every non-null cell parses, or when the parsed
    /// cells make up more than 80% of all rows (nulls included).
    pub fn clean(&mut self) {
        for idx in 0..self.columns.len() {
            let mut non_null = 0usize;
            let mut numeric = 0usize;

            for row in &mut self.rows {
                let cell = &mut row[idx];
                if let Value::Text(s) = cell {
                    if NULL_TOKENS.contains(&s.trim()) {
                        *cell = Value::Null;
                        continue;
                    }
                }
                match cell {
                    Value::Null => {}
                    Value::Number(_) => {
                        non_null += 1;
                        numeric += 1;
                    }
                    Value::Text(s) => {
                        non_null += 1;
                        if parse_number(s).is_some() {
                            numeric += 1;
                        }
                    }
                }
            }

            let total = self.rows.len();
            let convert = non_null > 0
                && (numeric == non_null || (numeric as f64 / total as f64) > NUMERIC_THRESHOLD);
            if convert {
                debug!(column = %self.columns[idx], numeric, non_null, total, "converting column to numeric");
                for row in &mut self.rows {
                    let cell = &mut row[idx];
                    if let Value::Text(s) = cell {
                        *cell = parse_number(s).map_or(Value::Null, Value::Number);
                    }
                }
                self.kinds[idx] = ColumnKind::Numeric;
            } else {
                for row in &mut self.rows {
                    if let Value::Text(s) = &mut row[idx] {
                        let trimmed = s.trim();
                        if trimmed.len() != s.len() {
                            *s = trimmed.to_string();
                        }
                    }
                }
                self.kinds[idx] = ColumnKind::Text;
            }
        }
    }
}

/// Finite numbers only; `inf` and `NaN` spellings stay text.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> Dataset {
        let mut ds = Dataset::from_csv_bytes(csv.as_bytes()).unwrap();
        ds.clean();
        ds
    }

    #[test]
    fn null_tokens_become_null() {
        let ds = load("a\nnan\nNone\n<NA>\nnull\nx\n");
        let nulls = ds.column_values(0).filter(|v| v.is_null()).count();
        assert_eq!(nulls, 4);
        assert_eq!(ds.kind(0), Some(ColumnKind::Text));
    }

    #[test]
    fn mostly_numeric_column_converts() {
        // 9 of 10 parse (90% > 80%)
        let ds = load("v\n1\n2\n3\n4\n5\n6\n7\n8\n9\nten\n");
        assert_eq!(ds.kind(0), Some(ColumnKind::Numeric));
        assert_eq!(ds.get(0, 0), Some(&Value::Number(1.0)));
        assert_eq!(ds.get(9, 0), Some(&Value::Null));
    }

    #[test]
    fn exactly_eighty_percent_stays_text() {
        let ds = load("v\n1\n2\n3\n4\nfive\n");
        assert_eq!(ds.kind(0), Some(ColumnKind::Text));
        assert_eq!(ds.get(4, 0), Some(&Value::text("five")));
    }

    #[test]
    fn sparse_column_with_stray_text_stays_text() {
        // 5 of 8 rows parse; the blank cells count against the ratio
        let ds = load("v,w\n1,a\n2,a\n3,a\n4,a\n5,a\n,a\n,a\nx,a\n");
        assert_eq!(ds.row_count(), 8);
        assert_eq!(ds.kind(0), Some(ColumnKind::Text));
        assert_eq!(ds.get(7, 0), Some(&Value::text("x")));
        assert_eq!(ds.get(0, 0), Some(&Value::text("1")));
        assert_eq!(ds.get(5, 0), Some(&Value::Null));
    }

    #[test]
    fn blank_lines_are_not_rows() {
        let ds = load("v\n1\n2\n\n\n3\n");
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.kind(0), Some(ColumnKind::Numeric));
    }

    #[test]
    fn sparse_all_numeric_column_converts() {
        let ds = load("v,w\n1,a\n,b\n,c\n4,d\n");
        assert_eq!(ds.kind(0), Some(ColumnKind::Numeric));
        assert_eq!(ds.get(3, 0), Some(&Value::Number(4.0)));
        assert_eq!(ds.get(1, 0), Some(&Value::Null));
    }

    #[test]
    fn text_is_trimmed() {
        let ds = load("name\n\"  Acme Timber  \"\n");
        assert_eq!(ds.get(0, 0), Some(&Value::text("Acme Timber")));
    }

    #[test]
    fn infinity_is_not_numeric() {
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(" 2.5 "), Some(2.5));
    }
}
