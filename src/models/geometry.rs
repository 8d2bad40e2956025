//! Transmitter/receiver geometry.

/// Effective propagation distance `r = sqrt(d² + Δh²)`.
///
/// NaN inputs propagate to the result.
pub fn effective_distance(horizontal: f64, vertical: f64) -> f64 {
    horizontal.hypot(vertical)
}
