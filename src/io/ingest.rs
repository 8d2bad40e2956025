//! CSV ingest of measured channel-impulse-response data.
//!
//! The measurement file is a table with (at least) a time column and a
//! peak-normalized amplitude column. Column names are configurable and matched
//! case-insensitively. Rows that fail to parse are skipped and reported, not
//! fatal: a single corrupt line should not abort a calibration.
//!
//! No normalization is applied here; amplitudes are taken as already scaled
//! to a peak of 1.0 by the measurement pipeline.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::EmpiricalSeries;
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the series plus row accounting.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub series: EmpiricalSeries,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load `(time, amplitude)` pairs from a CSV file.
pub fn load_series(path: &Path, time_column: &str, amplitude_column: &str) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_series(file, time_column, amplitude_column)
}

/// Load `(time, amplitude)` pairs from any CSV reader.
pub fn read_series<R: Read>(reader: R, time_column: &str, amplitude_column: &str) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = column_index(&header_map, time_column)?;
    let amp_idx = column_index(&header_map, amplitude_column)?;

    let mut times = Vec::new();
    let mut amplitudes = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1, records start at line 2.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let parsed = parse_field(&record, time_idx, time_column)
            .and_then(|t| parse_field(&record, amp_idx, amplitude_column).map(|y| (t, y)));
        match parsed {
            Ok((t, y)) => {
                times.push(t);
                amplitudes.push(y);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for err in &row_errors {
        log::warn!("skipping CSV line {}: {}", err.line, err.message);
    }

    let rows_used = times.len();
    let series = EmpiricalSeries::new(times, amplitudes).map_err(|e| AppError::new(2, e.to_string()))?;
    log::info!("loaded {rows_used} of {rows_read} rows");

    Ok(IngestedData {
        series,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn column_index(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing value: `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number for `{name}`: '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value for `{name}`: '{raw}'"))
    }
}
