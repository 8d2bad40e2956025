//! Export the per-grid-point comparison to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use serde::Serialize;

use crate::domain::FitResult;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct ExportRow {
    t: f64,
    model_normalized: f64,
    data_interpolated: f64,
    residual: f64,
}

/// Write `t, model, data, residual` for every grid point.
pub fn write_results_csv(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for ((&t, &model), &data) in fit.grid.as_slice().iter().zip(&fit.fitted).zip(&fit.target) {
        writer
            .serialize(ExportRow {
                t,
                model_normalized: model,
                data_interpolated: data,
                residual: model - data,
            })
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
