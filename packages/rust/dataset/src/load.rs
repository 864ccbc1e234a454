//! File type detection and CSV decoding.

use std::collections::HashMap;

use tracing::{debug, warn};

use tradescout_shared::{Result, TradeScoutError};

use crate::{Dataset, Value};

/// Upload formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Excel,
    Unknown,
}

/// Detect the file type from the file name.
pub fn detect_file_type(filename: &str) -> FileType {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        FileType::Csv
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        FileType::Excel
    } else {
        FileType::Unknown
    }
}

/// Load an uploaded file by type. Only CSV is readable.
pub fn load_file(bytes: &[u8], filename: &str) -> Result<Dataset> {
    match detect_file_type(filename) {
        FileType::Csv => Dataset::from_csv_bytes(bytes),
        FileType::Excel => Err(TradeScoutError::validation(format!(
            "Excel files are not supported ({filename}); save the sheet as CSV and upload that"
        ))),
        FileType::Unknown => Err(TradeScoutError::validation(format!(
            "Unsupported file type: {filename}"
        ))),
    }
}

impl Dataset {
    /// Parse CSV bytes with a header row. Cells load as text; empty cells
    /// load as null. Call [`Dataset::clean`] to infer numeric columns.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Dataset> {
        let text = decode(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| TradeScoutError::parse(format!("invalid CSV header: {e}")))?
            .clone();
        let columns = dedupe_headers(headers.iter().map(str::trim));
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(TradeScoutError::dataset("CSV file has no columns"));
        }

        let width = columns.len();
        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| TradeScoutError::parse(format!("CSV row {}: {e}", line + 2)))?;
            if record.len() > width {
                warn!(row = line + 2, fields = record.len(), width, "extra CSV fields dropped");
            }
            let row = record
                .iter()
                .take(width)
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::text(cell)
                    }
                })
                .collect();
            rows.push(row);
        }

        if rows.is_empty() {
            warn!("CSV file is empty");
        }
        debug!(rows = rows.len(), columns = width, "loaded CSV");
        Ok(Dataset::new(columns, rows))
    }
}

/// UTF-8 first, then Latin-1 (every byte maps to one code point).
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Repeated header names get `.1`, `.2`, ... suffixes.
fn dedupe_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .map(|name| {
            let count = seen.entry(name.to_string()).or_insert(0);
            let out = if *count == 0 {
                name.to_string()
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            out
        })
        .collect()
}
