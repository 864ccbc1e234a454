//! Built-in sample datasets for trying the workflow without an upload.

use crate::{Dataset, Value};

pub const BUSINESS_SAMPLE_FILENAME: &str = "sample_business_data.csv";
pub const TIMBER_SAMPLE_FILENAME: &str = "sample_timber_data.csv";

fn texts(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::text(*s)).collect()
}

fn numbers(items: &[f64]) -> Vec<Value> {
    items.iter().map(|n| Value::Number(*n)).collect()
}

/// Five companies across industries.
pub fn business_sample() -> Dataset {
    Dataset::from_columns(vec![
        (
            "Company",
            texts(&[
                "Tech Corp A",
                "Manufacturing B",
                "Retail C",
                "Services D",
                "Tech Corp E",
            ]),
        ),
        (
            "Industry",
            texts(&[
                "Technology",
                "Manufacturing",
                "Retail",
                "Professional Services",
                "Technology",
            ]),
        ),
        (
            "Revenue",
            numbers(&[1_000_000.0, 5_000_000.0, 2_500_000.0, 800_000.0, 1_500_000.0]),
        ),
        ("Employees", numbers(&[50.0, 200.0, 100.0, 25.0, 75.0])),
        (
            "Location",
            texts(&["San Francisco", "Detroit", "Chicago", "New York", "Austin"]),
        ),
        (
            "Founded",
            numbers(&[2015.0, 1995.0, 2008.0, 2010.0, 2018.0]),
        ),
    ])
}

/// Five timber importers shaped like a trade manifest.
pub fn timber_sample() -> Dataset {
    Dataset::from_columns(vec![
        (
            "Consignee Name",
            texts(&[
                "Acme Timber Corporation",
                "Global Wood Solutions",
                "Teakwood Trading Inc",
                "Premium Lumber LLC",
                "Forest Products Co",
            ]),
        ),
        (
            "Product",
            texts(&["Teak Wood", "Plywood", "Timber Logs", "Lumber", "Wood Panels"]),
        ),
        ("Quantity", numbers(&[100.0, 200.0, 150.0, 300.0, 75.0])),
        (
            "Value",
            numbers(&[10_000.0, 25_000.0, 18_000.0, 45_000.0, 8_500.0]),
        ),
        (
            "Consignee City",
            texts(&["Mumbai", "Delhi", "Chennai", "Bangalore", "Kolkata"]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnKind;

    #[test]
    fn samples_have_expected_shape() {
        let business = business_sample();
        assert_eq!(business.row_count(), 5);
        assert_eq!(business.numeric_columns(), vec!["Revenue", "Employees", "Founded"]);

        let timber = timber_sample();
        assert_eq!(timber.column_count(), 5);
        let city = timber.column_index("Consignee City").unwrap();
        assert_eq!(timber.kind(city), Some(ColumnKind::Text));
    }
}
