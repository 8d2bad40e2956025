//! Dense linear least squares.
//!
//! Each Levenberg–Marquardt trial step solves a small damped problem of the form:
//!
//! ```text
//! minimize ‖J h + r‖² + μ ‖D h‖²
//! ```
//!
//! which we write as one tall stacked system `[J; √μ·D] h ≈ [-r; 0]` and hand
//! to SVD. SVD copes with rank deficiency (e.g. a parameter the residual does
//! not depend on) without special casing. The parameter dimension is tiny
//! (≤ 3 columns), so cost is not a concern.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the damped step `[J; √μ·diag(scale)] h ≈ [-r; 0]`.
pub fn solve_damped_step(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    scale: &[f64],
    damping: f64,
) -> Option<DVector<f64>> {
    let m = jacobian.nrows();
    let n = jacobian.ncols();
    if scale.len() != n || residuals.len() != m {
        return None;
    }

    let mut stacked = DMatrix::<f64>::zeros(m + n, n);
    stacked.view_mut((0, 0), (m, n)).copy_from(jacobian);
    let root = damping.max(0.0).sqrt();
    for (j, &d) in scale.iter().enumerate() {
        stacked[(m + j, j)] = root * d;
    }

    let mut rhs = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        rhs[i] = -residuals[i];
    }

    solve_least_squares(&stacked, &rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn undamped_step_is_gauss_newton() {
        // r(x) = J x - y at x = 0 gives r = -y; the step should solve J h = y.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = DVector::from_row_slice(&[-2.0, -5.0, -8.0]);
        let h = solve_damped_step(&j, &r, &[1.0, 1.0], 0.0).unwrap();
        assert!((h[0] - 2.0).abs() < 1e-10);
        assert!((h[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let r = DVector::from_row_slice(&[-2.0, -5.0, -8.0]);
        let free = solve_damped_step(&j, &r, &[1.0, 1.0], 0.0).unwrap();
        let damped = solve_damped_step(&j, &r, &[1.0, 1.0], 100.0).unwrap();
        assert!(damped.norm() < free.norm());
    }

    #[test]
    fn zero_column_gets_zero_step() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let r = DVector::from_row_slice(&[-1.0, -2.0, -3.0]);
        let h = solve_damped_step(&j, &r, &[1.0, 0.0], 0.0).unwrap();
        assert!((h[0] - 1.0).abs() < 1e-10);
        assert!(h[1].abs() < 1e-12);
    }
}
