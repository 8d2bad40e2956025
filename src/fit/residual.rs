//! Residual evaluation between the normalized model and the measurement.
//!
//! For a candidate coefficient vector we evaluate the pulse model on the grid,
//! divide by the peak of *that* evaluation, and subtract the interpolated
//! measurement. Dividing by the current peak makes the residual independent
//! of the scale coefficient `a`; only `b` and `c` shape the normalized curve.
//!
//! Degenerate candidates (NaN/inf samples, or a peak that is not strictly
//! positive) surface as `FitError::NonFiniteModel` so the optimizer can reject
//! the trial step instead of dividing by zero.

use crate::domain::{Coefficients, TimeGrid};
use crate::error::FitError;
use crate::models::pulse_series;

/// Fixed inputs of the residual: grid, target, and resolved distance.
#[derive(Debug, Clone)]
pub struct ResidualEvaluator<'a> {
    grid: &'a TimeGrid,
    target: &'a [f64],
    distance: f64,
}

impl<'a> ResidualEvaluator<'a> {
    pub fn new(grid: &'a TimeGrid, target: &'a [f64], distance: f64) -> Result<Self, FitError> {
        if target.len() != grid.len() {
            return Err(FitError::InvalidInput(format!(
                "target has {} samples but grid has {}",
                target.len(),
                grid.len()
            )));
        }
        if !distance.is_finite() {
            return Err(FitError::InvalidInput(format!("effective distance is not finite ({distance})")));
        }
        Ok(Self {
            grid,
            target,
            distance,
        })
    }

    /// Model on the grid divided by its own peak.
    pub fn normalized_model(&self, coeffs: &Coefficients) -> Result<Vec<f64>, FitError> {
        let mut values = pulse_series(self.grid.as_slice(), coeffs, self.distance);
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(FitError::non_finite(format!(
                "model is {} at t={} for {coeffs}",
                values[i],
                self.grid.as_slice()[i]
            )));
        }

        let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(peak > 0.0) {
            return Err(FitError::non_finite(format!("model peak is {peak} (must be > 0) for {coeffs}")));
        }

        for v in &mut values {
            *v /= peak;
        }
        Ok(values)
    }

    /// `normalized_model[i] - target[i]` for every grid index.
    pub fn residuals(&self, coeffs: &Coefficients) -> Result<Vec<f64>, FitError> {
        let model = self.normalized_model(coeffs)?;
        Ok(model.iter().zip(self.target).map(|(m, y)| m - y).collect())
    }

    /// Adapter for solvers working on raw parameter slices.
    pub fn residuals_for(&self, params: &[f64]) -> Result<Vec<f64>, FitError> {
        let coeffs = Coefficients::from_slice(params).ok_or_else(|| {
            FitError::InvalidInput(format!(
                "expected {} parameters, got {}",
                Coefficients::LEN,
                params.len()
            ))
        })?;
        self.residuals(&coeffs)
    }

    /// `½ Σ r²` at `coeffs`.
    pub fn cost(&self, coeffs: &Coefficients) -> Result<f64, FitError> {
        Ok(0.5 * self.residuals(coeffs)?.iter().map(|r| r * r).sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TimeGrid {
        TimeGrid::linspace(0.1, 2.0, 50).unwrap()
    }

    #[test]
    fn residual_is_zero_when_target_is_the_normalized_model() {
        let grid = grid();
        let coeffs = Coefficients::new(3.0, 0.8, 1.2);
        let r = 1.0f64.hypot(0.15);

        let zeros = vec![0.0; grid.len()];

        let probe = ResidualEvaluator::new(&grid, &zeros, r).unwrap();
        let target = probe.normalized_model(&coeffs).unwrap();

        let eval = ResidualEvaluator::new(&grid, &target, r).unwrap();
        let res = eval.residuals(&coeffs).unwrap();
        assert_eq!(res.len(), grid.len());
        assert!(res.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn normalized_model_has_unit_peak() {
        let grid = grid();
        let zeros = vec![0.0; grid.len()];
        let eval = ResidualEvaluator::new(&grid, &zeros, 1.0).unwrap();
        let m = eval.normalized_model(&Coefficients::new(3.0, 1.4e-4, 4.0)).unwrap();
        let peak = m.iter().copied().fold(f64::MIN, f64::max);
        assert!((peak - 1.0).abs() < 1e-15);
    }

    #[test]
    fn scale_coefficient_is_unidentifiable() {
        // Expected degeneracy: normalization by the current peak cancels `a`.
        let grid = grid();
        let target: Vec<f64> = grid.as_slice().iter().map(|t| (-t).exp()).collect();
        let eval = ResidualEvaluator::new(&grid, &target, 1.0).unwrap();
        let r1 = eval.residuals(&Coefficients::new(1.0, 0.5, 2.0)).unwrap();
        let r2 = eval.residuals(&Coefficients::new(250.0, 0.5, 2.0)).unwrap();
        for (x, y) in r1.iter().zip(&r2) {
            assert!((x - y).abs() < 1e-12);
        }

        let r3 = eval.residuals(&Coefficients::new(1.0, 0.9, 2.0)).unwrap();
        assert!(r1.iter().zip(&r3).any(|(x, y)| (x - y).abs() > 1e-6));
    }

    #[test]
    fn non_positive_peak_is_degenerate() {
        let grid = grid();
        let zeros = vec![0.0; grid.len()];
        let eval = ResidualEvaluator::new(&grid, &zeros, 1.0).unwrap();
        for a in [0.0, -2.0] {
            let err = eval.residuals(&Coefficients::new(a, 1.0, 1.0)).unwrap_err();
            assert!(matches!(err, FitError::NonFiniteModel { .. }), "a={a}: {err:?}");
        }
    }

    #[test]
    fn overflowing_model_is_degenerate() {
        // Negative spread with a large gap makes the exponential overflow.
        let grid = grid();
        let zeros = vec![0.0; grid.len()];
        let eval = ResidualEvaluator::new(&grid, &zeros, 1.0).unwrap();
        let err = eval.residuals(&Coefficients::new(1.0, -1e4, 50.0)).unwrap_err();
        assert!(matches!(err, FitError::NonFiniteModel { .. }));
    }

    #[test]
    fn underflowing_model_is_degenerate() {
        // Every sample underflows to zero, so the peak is zero.
        let grid = grid();
        let zeros = vec![0.0; grid.len()];
        let eval = ResidualEvaluator::new(&grid, &zeros, 1.0).unwrap();
        let err = eval.residuals(&Coefficients::new(1.0, 1e6, 100.0)).unwrap_err();
        assert!(matches!(err, FitError::NonFiniteModel { .. }));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let grid = grid();
        assert!(ResidualEvaluator::new(&grid, &[0.0; 3], 1.0).is_err());
    }

    #[test]
    fn slice_adapter_requires_three_parameters() {
        let grid = grid();
        let zeros = vec![0.0; grid.len()];
        let eval = ResidualEvaluator::new(&grid, &zeros, 1.0).unwrap();
        assert!(matches!(eval.residuals_for(&[1.0, 2.0]), Err(FitError::InvalidInput(_))));
        assert!(eval.residuals_for(&[1.0, 0.5, 2.0]).is_ok());
    }
}
