//! Read/write curve JSON files.
//!
//! Curve JSON is the "portable" representation of a fit:
//! - geometry plus initial and fitted coefficients
//! - final cost and convergence status
//! - the evaluation grid with the normalized fitted and measured curves
//!
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveFile, CurveGrid, FitResult};
use crate::error::AppError;

/// Build the serializable form of a fit.
pub fn curve_file(fit: &FitResult) -> CurveFile {
    CurveFile {
        tool: "cirfit".to_string(),
        generated_at: Utc::now(),
        geometry: fit.geometry,
        initial: fit.initial,
        coefficients: fit.coefficients,
        cost: fit.cost,
        converged: fit.is_converged(),
        termination: fit.termination,
        grid: CurveGrid {
            t: fit.grid.as_slice().to_vec(),
            fitted: fit.fitted.clone(),
            measured: fit.target.clone(),
        },
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &curve_file(fit))
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;

    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;

    let n = curve.grid.t.len();
    if curve.grid.fitted.len() != n || curve.grid.measured.len() != n {
        return Err(AppError::new(
            2,
            format!(
                "Invalid curve JSON: grid has {n} times but {} fitted / {} measured values",
                curve.grid.fitted.len(),
                curve.grid.measured.len()
            ),
        ));
    }
    Ok(curve)
}
