//! Quick charts over a dataset: overview, histogram, scatter, top values.
//!
//! Charts are plain data ([`ChartSpec`]) so they can be exported as JSON or
//! drawn as text bars in a terminal.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use tradescout_dataset::{ColumnKind, Dataset, format_number};
use tradescout_shared::{Result, TradeScoutError};

pub const DEFAULT_BINS: usize = 10;
pub const DEFAULT_TOP_VALUES: usize = 10;

/// Widest text bar, in characters.
const BAR_WIDTH: usize = 40;

/// Scatter points drawn by the text renderer.
const SCATTER_PREVIEW: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub numeric_columns: usize,
    pub text_columns: usize,
}

pub fn overview(dataset: &Dataset) -> Overview {
    Overview {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        numeric_columns: dataset.numeric_columns().len(),
        text_columns: dataset.text_columns().len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartSpec {
    Histogram {
        title: String,
        column: String,
        bins: Vec<HistogramBin>,
    },
    Scatter {
        title: String,
        x: String,
        y: String,
        points: Vec<(f64, f64)>,
        /// Pearson correlation, absent when either axis is constant.
        correlation: Option<f64>,
    },
    Bar {
        title: String,
        column: String,
        values: Vec<(String, usize)>,
    },
}

fn require_numeric(dataset: &Dataset, column: &str) -> Result<usize> {
    let idx = dataset.require_column(column)?;
    if dataset.kind(idx) != Some(ColumnKind::Numeric) {
        return Err(TradeScoutError::validation(format!(
            "column '{column}' is not numeric"
        )));
    }
    Ok(idx)
}

/// Equal-width histogram. The last bin is closed on the right; a constant
/// column yields a single bin.
pub fn histogram(dataset: &Dataset, column: &str, bins: usize) -> Result<ChartSpec> {
    let idx = require_numeric(dataset, column)?;
    let values: Vec<f64> = dataset.column_values(idx).filter_map(|v| v.as_f64()).collect();
    let bins = bins.max(1);

    let mut out = Vec::new();
    if !values.is_empty() {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            out.push(HistogramBin {
                start: min,
                end: max,
                count: values.len(),
            });
        } else {
            let width = (max - min) / bins as f64;
            out = (0..bins)
                .map(|i| HistogramBin {
                    start: min + width * i as f64,
                    end: if i + 1 == bins {
                        max
                    } else {
                        min + width * (i + 1) as f64
                    },
                    count: 0,
                })
                .collect();
            for v in values {
                let slot = (((v - min) / width) as usize).min(bins - 1);
                out[slot].count += 1;
            }
        }
    }

    Ok(ChartSpec::Histogram {
        title: format!("Distribution of {column}"),
        column: column.to_string(),
        bins: out,
    })
}

/// Points for rows where both columns hold numbers.
pub fn scatter(dataset: &Dataset, x: &str, y: &str) -> Result<ChartSpec> {
    if x == y {
        return Err(TradeScoutError::validation(
            "Select two different columns for a scatter plot",
        ));
    }
    let xi = require_numeric(dataset, x)?;
    let yi = require_numeric(dataset, y)?;
    let points: Vec<(f64, f64)> = dataset
        .rows()
        .iter()
        .filter_map(|row| Some((row[xi].as_f64()?, row[yi].as_f64()?)))
        .collect();

    Ok(ChartSpec::Scatter {
        title: format!("{x} vs {y}"),
        x: x.to_string(),
        y: y.to_string(),
        correlation: pearson(&points),
        points,
    })
}

fn pearson(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Most frequent values of any column.
pub fn top_values(dataset: &Dataset, column: &str, top: usize) -> Result<ChartSpec> {
    Ok(ChartSpec::Bar {
        title: format!("Top {top} values in {column}"),
        column: column.to_string(),
        values: dataset.value_counts(column, top)?,
    })
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = (count * BAR_WIDTH).div_ceil(max);
    "█".repeat(len)
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::Histogram { title, .. }
            | ChartSpec::Scatter { title, .. }
            | ChartSpec::Bar { title, .. } => title,
        }
    }

    /// Render as text with horizontal bars.
    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n", self.title());
        match self {
            ChartSpec::Histogram { bins, .. } => {
                let labels: Vec<String> = bins
                    .iter()
                    .map(|b| format!("{:.2} - {:.2}", b.start, b.end))
                    .collect();
                let width = labels.iter().map(String::len).max().unwrap_or(0);
                let max = bins.iter().map(|b| b.count).max().unwrap_or(0);
                for (label, b) in labels.iter().zip(bins) {
                    let _ = writeln!(out, "{label:>width$} | {} {}", bar(b.count, max), b.count);
                }
                if bins.is_empty() {
                    out.push_str("(no numeric values)\n");
                }
            }
            ChartSpec::Bar { values, .. } => {
                let width = values.iter().map(|(v, _)| v.chars().count()).max().unwrap_or(0);
                let max = values.iter().map(|(_, n)| *n).max().unwrap_or(0);
                for (value, n) in values {
                    let _ = writeln!(out, "{value:<width$} | {} {n}", bar(*n, max));
                }
                if values.is_empty() {
                    out.push_str("(no values)\n");
                }
            }
            ChartSpec::Scatter {
                x,
                y,
                points,
                correlation,
                ..
            } => {
                let _ = writeln!(out, "{} points", points.len());
                match correlation {
                    Some(r) => {
                        let _ = writeln!(out, "correlation: {r:.3}");
                    }
                    None => out.push_str("correlation: n/a\n"),
                }
                let _ = writeln!(out, "{x} | {y}");
                for (px, py) in points.iter().take(SCATTER_PREVIEW) {
                    let _ = writeln!(out, "{} | {}", format_number(*px), format_number(*py));
                }
                if points.len() > SCATTER_PREVIEW {
                    let _ = writeln!(out, "... {} more", points.len() - SCATTER_PREVIEW);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradescout_dataset::{Value, sample};

    fn nums(name: &str, values: &[f64]) -> Dataset {
        Dataset::from_columns(vec![(
            name,
            values.iter().map(|v| Value::Number(*v)).collect(),
        )])
    }

    #[test]
    fn overview_counts_kinds() {
        let ov = overview(&sample::timber_sample());
        assert_eq!(ov.rows, 5);
        assert_eq!(ov.columns, 5);
        assert_eq!(ov.numeric_columns, 2);
        assert_eq!(ov.text_columns, 3);
    }

    #[test]
    fn histogram_bins_cover_range() {
        let ds = nums("v", &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let ChartSpec::Histogram { bins, .. } = histogram(&ds, "v", DEFAULT_BINS).unwrap() else {
            panic!("expected histogram");
        };
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 11);
        // max lands in the last, right-closed bin
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].end, 10.0);
    }

    #[test]
    fn constant_column_is_one_bin() {
        let ds = nums("v", &[4.0, 4.0, 4.0]);
        let ChartSpec::Histogram { bins, .. } = histogram(&ds, "v", 10).unwrap() else {
            panic!("expected histogram");
        };
        assert_eq!(bins, vec![HistogramBin { start: 4.0, end: 4.0, count: 3 }]);
    }

    #[test]
    fn histogram_rejects_text_column() {
        assert!(histogram(&sample::timber_sample(), "Product", 10).is_err());
        assert!(histogram(&sample::timber_sample(), "Missing", 10).is_err());
    }

    #[test]
    fn scatter_needs_distinct_columns() {
        let ds = sample::timber_sample();
        assert!(scatter(&ds, "Value", "Value").is_err());
        let ChartSpec::Scatter {
            points,
            correlation,
            ..
        } = scatter(&ds, "Quantity", "Value").unwrap()
        else {
            panic!("expected scatter");
        };
        assert_eq!(points.len(), 5);
        assert!(correlation.unwrap() > 0.9);
    }

    #[test]
    fn top_values_and_render() {
        let chart = top_values(&sample::business_sample(), "Industry", DEFAULT_TOP_VALUES).unwrap();
        let text = chart.render_text();
        assert!(text.starts_with("Top 10 values in Industry"));
        assert!(text.contains("Technology"));
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["chart"], "bar");
        assert_eq!(json["values"][0][0], "Technology");
        assert_eq!(json["values"][0][1], 2);
    }
}
