//! Evaluation grid generation.

use crate::error::FitError;

/// Generate `steps` linearly spaced points between `min` and `max` (inclusive).
pub fn linspace(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(FitError::InvalidGrid(format!(
            "invalid range: start={min}, end={max} (must be finite and end>start)"
        )));
    }
    if steps < 2 {
        return Err(FitError::InvalidGrid("sample count must be >= 2".to_string()));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps - 1 {
        out.push(min + step * i as f64);
    }
    // Pin the endpoint exactly rather than accumulating rounding.
    out.push(max);
    Ok(out)
}
