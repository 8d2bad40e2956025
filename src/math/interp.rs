//! Resampling of irregular measurements onto an evaluation grid.
//!
//! Measured CIR data is recorded on whatever time base the instrument used.
//! Before fitting we map it onto the model's `TimeGrid` with piecewise-linear
//! interpolation. Outside the observed range the nearest boundary segment is
//! extended linearly (no clamping).

use crate::domain::{EmpiricalSeries, TimeGrid};
use crate::error::FitError;

/// Resample a series onto a grid.
///
/// Implementations must return exactly one value per grid point.
pub trait Interpolate {
    fn interpolate(&self, series: &EmpiricalSeries, grid: &TimeGrid) -> Result<Vec<f64>, FitError>;
}

/// Piecewise-linear interpolation with linear extrapolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl Interpolate for LinearInterpolator {
    fn interpolate(&self, series: &EmpiricalSeries, grid: &TimeGrid) -> Result<Vec<f64>, FitError> {
        let knots = prepare_knots(series)?;
        Ok(grid.as_slice().iter().map(|&t| eval_linear(&knots, t)).collect())
    }
}

/// Sort samples by time and merge duplicate times by averaging their amplitudes.
fn prepare_knots(series: &EmpiricalSeries) -> Result<Vec<(f64, f64)>, FitError> {
    if series.times.len() != series.amplitudes.len() {
        return Err(FitError::InvalidInput(format!(
            "series length mismatch: {} times vs {} amplitudes",
            series.times.len(),
            series.amplitudes.len()
        )));
    }
    if series.len() < 2 {
        return Err(FitError::InsufficientData { found: series.len() });
    }
    if series.pairs().any(|(t, y)| !(t.is_finite() && y.is_finite())) {
        return Err(FitError::InvalidInput("series contains non-finite samples".to_string()));
    }

    let mut pairs: Vec<(f64, f64)> = series.pairs().collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut knots: Vec<(f64, f64)> = Vec::with_capacity(pairs.len());
    let mut i = 0;
    while i < pairs.len() {
        let t = pairs[i].0;
        let mut sum = 0.0;
        let mut count = 0usize;
        while i < pairs.len() && pairs[i].0 == t {
            sum += pairs[i].1;
            count += 1;
            i += 1;
        }
        knots.push((t, sum / count as f64));
    }

    if knots.len() < 2 {
        return Err(FitError::InsufficientData { found: knots.len() });
    }
    Ok(knots)
}

/// `knots` is sorted, strictly increasing in time, with at least 2 entries.
fn eval_linear(knots: &[(f64, f64)], t: f64) -> f64 {
    // Index of the first knot strictly after `t`, clamped so that the
    // bracketing segment is always [seg, seg + 1].
    let upper = knots.partition_point(|k| k.0 <= t);
    let seg = upper.saturating_sub(1).min(knots.len() - 2);

    let (t0, y0) = knots[seg];
    let (t1, y1) = knots[seg + 1];
    if t == t0 {
        return y0;
    }
    if t == t1 {
        return y1;
    }
    y0 + (y1 - y0) * (t - t0) / (t1 - t0)
}
