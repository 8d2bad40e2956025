//! Pulse-response forward model.
//!
//! ```text
//! M(t) = (a / sqrt(t)) * exp(-b * (r - c·t)² / t)
//! ```
//!
//! The `1/sqrt(t)` factor is diffusive spreading; the exponential penalizes the
//! gap between the static distance `r` and the advected distance `c·t`.
//!
//! `t` must be strictly positive. Grids are validated on construction
//! (`domain::TimeGrid`), so no guard is applied here.

use crate::domain::Coefficients;

/// Evaluate the model at a single time.
pub fn pulse(t: f64, coeffs: &Coefficients, distance: f64) -> f64 {
    let gap = distance - coeffs.c * t;
    (coeffs.a / t.sqrt()) * (-coeffs.b * gap * gap / t).exp()
}

/// Evaluate the model element-wise over `times`.
pub fn pulse_series(times: &[f64], coeffs: &Coefficients, distance: f64) -> Vec<f64> {
    times.iter().map(|&t| pulse(t, coeffs, distance)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_matches_closed_form() {
        let coeffs = Coefficients::new(3.0, 1.4e-4, 4.0);
        let r = 1.0f64.hypot(0.15);
        let t = 0.5;
        let expected = 3.0 / 0.5f64.sqrt() * (-1.4e-4 * (r - 2.0) * (r - 2.0) / 0.5).exp();
        assert!((pulse(t, &coeffs, r) - expected).abs() < 1e-12);
    }

    #[test]
    fn pulse_is_finite_on_positive_grid() {
        let coeffs = Coefficients::new(3.0, 1.4e-4, 4.0);
        let times: Vec<f64> = (1..=500).map(|i| i as f64 * 0.04).collect();
        let values = pulse_series(&times, &coeffs, 1.0);
        assert_eq!(values.len(), times.len());
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn pulse_peaks_when_transport_reaches_distance() {
        // With a large spread the exponential dominates, so the peak sits near t = r / c.
        let coeffs = Coefficients::new(1.0, 50.0, 2.0);
        let times: Vec<f64> = (1..=400).map(|i| i as f64 * 0.005).collect();
        let values = pulse_series(&times, &coeffs, 1.0);
        let (idx, _) = values
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert!((times[idx] - 0.5).abs() < 0.05, "peak at {}", times[idx]);
    }

    #[test]
    fn scale_is_linear() {
        let r = 1.2;
        let one = pulse(0.7, &Coefficients::new(1.0, 0.3, 1.5), r);
        let two = pulse(0.7, &Coefficients::new(2.0, 0.3, 1.5), r);
        assert!((two - 2.0 * one).abs() < 1e-12);
    }
}
