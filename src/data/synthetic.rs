//! Synthetic CIR measurements generated from the forward model.
//!
//! A synthetic trace is the peak-normalized model on a grid plus seeded
//! Gaussian noise, re-normalized to a peak of 1.0 the way the measurement
//! pipeline would. The same seed always produces the same trace.

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{Coefficients, EmpiricalSeries, Geometry, GridSpec};
use crate::error::{AppError, FitError};
use crate::fit::ResidualEvaluator;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub coefficients: Coefficients,
    pub geometry: Geometry,
    pub grid: GridSpec,
    /// Noise standard deviation, in units of the (unit) peak.
    pub noise: f64,
    pub seed: u64,
}

pub fn generate_synthetic(config: &SynthConfig) -> Result<EmpiricalSeries, FitError> {
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "noise level must be finite and >= 0 (got {})",
            config.noise
        )));
    }

    let grid = config.grid.build()?;
    let zeros = vec![0.0; grid.len()];
    let clean = ResidualEvaluator::new(&grid, &zeros, config.geometry.effective_distance())?
        .normalized_model(&config.coefficients)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| FitError::InvalidInput(format!("noise distribution error: {e}")))?;

    let noisy: Vec<f64> = clean.iter().map(|&v| v + normal.sample(&mut rng)).collect();
    let peak = noisy.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(peak.is_finite() && peak > 0.0) {
        return Err(FitError::non_finite(format!("synthetic trace peak is {peak}")));
    }

    EmpiricalSeries::new(grid.as_slice().to_vec(), noisy.iter().map(|v| v / peak).collect())
}

/// Write a series as a two-column CSV.
pub fn write_series_csv(
    path: &Path,
    series: &EmpiricalSeries,
    time_column: &str,
    amplitude_column: &str,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record([time_column, amplitude_column])
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;
    for (t, y) in series.pairs() {
        writer
            .write_record([t.to_string(), y.to_string()])
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}
