//! Calibration driver.
//!
//! Given:
//! - an empirical series (peak-normalized measurement)
//! - an evaluation grid
//! - the transmitter/receiver geometry
//! - an initial coefficient guess
//!
//! we interpolate the measurement onto the grid once, then let the solver
//! adjust `(a, b, c)` until the normalized model matches it in a least-squares
//! sense. Interpolation and minimization are injected so either can be swapped.

use crate::domain::{Coefficients, EmpiricalSeries, FitResult, Geometry, TimeGrid, Tolerances};
use crate::error::FitError;
use crate::fit::residual::ResidualEvaluator;
use crate::math::{Interpolate, LevenbergMarquardt, LinearInterpolator, MinimizeLeastSquares};

/// Everything a single calibration needs besides the data.
#[derive(Debug, Clone)]
pub struct CalibrationInput<'a> {
    pub series: &'a EmpiricalSeries,
    pub grid: &'a TimeGrid,
    pub geometry: Geometry,
    pub initial: Coefficients,
    pub tolerances: Tolerances,
}

/// Calibrate with piecewise-linear interpolation and Levenberg–Marquardt.
pub fn calibrate(input: &CalibrationInput<'_>) -> Result<FitResult, FitError> {
    calibrate_with(input, &LinearInterpolator, &LevenbergMarquardt::default())
}

/// Calibrate with explicit interpolation and solver implementations.
pub fn calibrate_with(
    input: &CalibrationInput<'_>,
    interpolator: &dyn Interpolate,
    solver: &dyn MinimizeLeastSquares,
) -> Result<FitResult, FitError> {
    let target = interpolator.interpolate(input.series, input.grid)?;
    if target.len() != input.grid.len() {
        return Err(FitError::InvalidInput(format!(
            "interpolator returned {} values for a grid of {}",
            target.len(),
            input.grid.len()
        )));
    }
    log::info!(
        "interpolated {} samples onto {} grid points over [{}, {}]",
        input.series.len(),
        input.grid.len(),
        input.grid.start(),
        input.grid.end()
    );

    let distance = input.geometry.effective_distance();
    let evaluator = ResidualEvaluator::new(input.grid, &target, distance)?;
    log::debug!("effective distance r = {distance}");

    let mut residual = |params: &[f64]| evaluator.residuals_for(params);
    let solution = solver.minimize(&input.initial.to_array(), &mut residual, &input.tolerances)?;

    let coefficients = Coefficients::from_slice(&solution.params).ok_or_else(|| {
        FitError::InvalidInput(format!(
            "solver returned {} parameters, expected {}",
            solution.params.len(),
            Coefficients::LEN
        ))
    })?;
    let fitted = evaluator.normalized_model(&coefficients)?;

    if solution.termination.is_converged() {
        log::info!("fit {} with cost {:.6e}", solution.termination, solution.cost);
    } else {
        log::warn!(
            "fit {}; reporting best iterate ({coefficients}) with cost {:.6e}",
            solution.termination,
            solution.cost
        );
    }

    Ok(FitResult {
        initial: input.initial,
        coefficients,
        initial_cost: solution.initial_cost,
        cost: solution.cost,
        termination: solution.termination,
        iterations: solution.iterations,
        evaluations: solution.evaluations,
        geometry: input.geometry,
        grid: input.grid.clone(),
        target,
        fitted,
        residuals: solution.residuals,
        history: solution.history,
    })
}
