//! Levenberg–Marquardt nonlinear least squares.
//!
//! We minimize `cost(x) = ½ Σ r_i(x)²` for a black-box residual function.
//! Each iteration:
//!
//! 1. linearizes `r` around the current iterate with a forward-difference Jacobian
//! 2. solves the damped step `(JᵀJ + μ D²) h = -Jᵀr` (Marquardt scaling `D`)
//! 3. evaluates the trial point and compares actual vs predicted reduction
//! 4. accepts (μ shrinks) or rejects (μ grows) the step
//!
//! The search stops on the gradient, step-size, or cost-change tolerance, or
//! when the iteration budget runs out. An exhausted budget is reported as
//! `Termination::ConvergenceFailure` together with the best iterate.
//!
//! Degenerate trial points (`FitError::NonFiniteModel`) count as rejected
//! steps. The same error at the initial guess is returned to the caller, since
//! there is no valid iterate to fall back to.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{ConvergenceReason, Termination, Tolerances};
use crate::error::FitError;
use crate::math::ols::solve_damped_step;

/// Residual function as seen by a solver.
pub type ResidualFn<'a> = dyn FnMut(&[f64]) -> Result<Vec<f64>, FitError> + 'a;

/// A nonlinear least-squares solver.
pub trait MinimizeLeastSquares {
    fn minimize(
        &self,
        initial: &[f64],
        residual: &mut ResidualFn<'_>,
        tolerances: &Tolerances,
    ) -> Result<Minimization, FitError>;
}

/// Solver output.
#[derive(Debug, Clone)]
pub struct Minimization {
    /// Best iterate found (the converged point when `termination` is `Converged`).
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    pub cost: f64,
    pub initial_cost: f64,
    pub termination: Termination,
    /// Trial steps taken.
    pub iterations: usize,
    /// Residual function calls, including Jacobian probes.
    pub evaluations: usize,
    pub history: Vec<IterationRecord>,
}

/// What happened to a trial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Accepted,
    /// Cost did not improve enough (or the step could not be solved).
    Rejected,
    /// The trial point produced a non-finite model.
    Degenerate,
}

/// One trial step, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Cost of the current iterate after this step was resolved.
    pub cost: f64,
    /// Damping used to compute the step.
    pub damping: f64,
    pub step_norm: f64,
    pub outcome: StepOutcome,
}

/// Levenberg–Marquardt with Marquardt scaling and Nielsen's damping update.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    /// Initial damping, relative to the Marquardt scale.
    pub initial_damping: f64,
    /// Minimum gain ratio (actual / predicted reduction) to accept a step.
    pub accept_ratio: f64,
    /// Jacobian columns with norm below `ratio × max column norm` are frozen for the step.
    pub insensitive_ratio: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            initial_damping: 1e-3,
            accept_ratio: 1e-4,
            insensitive_ratio: 1e-6,
        }
    }
}

const MAX_DAMPING: f64 = 1e32;
const MAX_DAMPING_GROWTH: f64 = 1e6;

impl MinimizeLeastSquares for LevenbergMarquardt {
    fn minimize(
        &self,
        initial: &[f64],
        residual: &mut ResidualFn<'_>,
        tolerances: &Tolerances,
    ) -> Result<Minimization, FitError> {
        if initial.is_empty() {
            return Err(FitError::InvalidInput("initial guess is empty".to_string()));
        }
        if initial.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput("initial guess must be finite".to_string()));
        }

        let mut evaluations = 1usize;
        let first = residual(initial)?;
        if first.is_empty() {
            return Err(FitError::InvalidInput("residual vector is empty".to_string()));
        }
        let m = first.len();
        let mut r = checked_residuals(first, m)?;
        let mut x = DVector::from_column_slice(initial);
        let mut cost = half_sum_sq(&r);
        let initial_cost = cost;

        let mut history = Vec::new();
        let mut iterations = 0usize;

        let finish = |x: &DVector<f64>,
                      r: &DVector<f64>,
                      cost: f64,
                      termination: Termination,
                      iterations: usize,
                      evaluations: usize,
                      history: Vec<IterationRecord>| {
            log::debug!(
                "least squares finished: {termination}; cost {initial_cost:.6e} -> {cost:.6e} in {iterations} steps ({evaluations} evaluations)"
            );
            Minimization {
                params: x.iter().copied().collect(),
                residuals: r.iter().copied().collect(),
                cost,
                initial_cost,
                termination,
                iterations,
                evaluations,
                history,
            }
        };

        if cost == 0.0 {
            let done = Termination::Converged(ConvergenceReason::ZeroCost);
            return Ok(finish(&x, &r, cost, done, 0, evaluations, history));
        }

        let mut jac = forward_jacobian(residual, &x, &r, &mut evaluations)?;
        let mut scale = column_norms(&jac);
        if jac.tr_mul(&r).amax() <= tolerances.gtol {
            let done = Termination::Converged(ConvergenceReason::Gradient);
            return Ok(finish(&x, &r, cost, done, 0, evaluations, history));
        }

        let mut mu = self.initial_damping;
        let mut nu = 2.0;

        let termination = loop {
            if iterations >= tolerances.max_iterations {
                break Termination::ConvergenceFailure { iterations };
            }
            iterations += 1;

            let active = active_columns(&jac, self.insensitive_ratio);
            if active.is_empty() {
                // Nothing left that moves the residual.
                break Termination::Converged(ConvergenceReason::Gradient);
            }

            let Some(h) = damped_step(&jac, &r, &scale, &active, mu) else {
                log::trace!("step {iterations}: damped system unsolvable at mu={mu:.3e}");
                history.push(IterationRecord {
                    iteration: iterations,
                    cost,
                    damping: mu,
                    step_norm: f64::NAN,
                    outcome: StepOutcome::Rejected,
                });
                mu = (mu * nu).min(MAX_DAMPING);
                nu = (nu * 2.0).min(MAX_DAMPING_GROWTH);
                continue;
            };

            let step_norm = h.norm();
            if step_norm <= tolerances.xtol * (x.norm() + tolerances.xtol) {
                break Termination::Converged(ConvergenceReason::StepSize);
            }

            let x_trial = &x + &h;
            evaluations += 1;
            let trial = residual(x_trial.as_slice()).and_then(|v| checked_residuals(v, m));

            let r_trial = match trial {
                Ok(v) => v,
                Err(FitError::NonFiniteModel { reason }) => {
                    log::trace!("step {iterations}: degenerate trial point ({reason}), mu={mu:.3e}");
                    history.push(IterationRecord {
                        iteration: iterations,
                        cost,
                        damping: mu,
                        step_norm,
                        outcome: StepOutcome::Degenerate,
                    });
                    mu = (mu * nu).min(MAX_DAMPING);
                    nu = (nu * 2.0).min(MAX_DAMPING_GROWTH);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let trial_cost = half_sum_sq(&r_trial);
            let predicted = cost - half_sum_sq(&(&r + &jac * &h));
            let actual = cost - trial_cost;
            let rho = if predicted > 0.0 { actual / predicted } else { -1.0 };

            if rho > self.accept_ratio && trial_cost.is_finite() {
                let previous = cost;
                x = x_trial;
                r = r_trial;
                cost = trial_cost;
                history.push(IterationRecord {
                    iteration: iterations,
                    cost,
                    damping: mu,
                    step_norm,
                    outcome: StepOutcome::Accepted,
                });
                log::trace!("step {iterations}: accepted, cost={cost:.6e}, rho={rho:.3}, mu={mu:.3e}");

                mu *= (1.0 - (2.0 * rho - 1.0).powi(3)).max(1.0 / 3.0);
                nu = 2.0;

                if cost == 0.0 {
                    break Termination::Converged(ConvergenceReason::ZeroCost);
                }
                if actual <= tolerances.ftol * previous {
                    break Termination::Converged(ConvergenceReason::CostChange);
                }

                jac = forward_jacobian(residual, &x, &r, &mut evaluations)?;
                for (s, n) in scale.iter_mut().zip(column_norms(&jac)) {
                    *s = s.max(n);
                }
                if jac.tr_mul(&r).amax() <= tolerances.gtol {
                    break Termination::Converged(ConvergenceReason::Gradient);
                }
            } else {
                history.push(IterationRecord {
                    iteration: iterations,
                    cost,
                    damping: mu,
                    step_norm,
                    outcome: StepOutcome::Rejected,
                });
                log::trace!("step {iterations}: rejected, trial cost={trial_cost:.6e}, rho={rho:.3}, mu={mu:.3e}");
                mu = (mu * nu).min(MAX_DAMPING);
                nu = (nu * 2.0).min(MAX_DAMPING_GROWTH);
            }
        };

        Ok(finish(&x, &r, cost, termination, iterations, evaluations, history))
    }
}

/// Reject residual vectors of the wrong length (hard error) or with
/// non-finite entries (degenerate model).
fn checked_residuals(values: Vec<f64>, expected_len: usize) -> Result<DVector<f64>, FitError> {
    if values.len() != expected_len {
        return Err(FitError::InvalidInput(format!(
            "residual length changed: expected {expected_len}, got {}",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FitError::non_finite("residual vector contains NaN/inf"));
    }
    Ok(DVector::from_vec(values))
}

fn half_sum_sq(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

/// Forward-difference Jacobian; falls back to a backward probe when the
/// forward one is degenerate, and to a zero column when both are.
fn forward_jacobian(
    residual: &mut ResidualFn<'_>,
    x: &DVector<f64>,
    r: &DVector<f64>,
    evaluations: &mut usize,
) -> Result<DMatrix<f64>, FitError> {
    let m = r.len();
    let n = x.len();
    let root_eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(m, n);

    for j in 0..n {
        let step = root_eps * x[j].abs().max(1.0);
        let mut column = None;

        for direction in [1.0, -1.0] {
            let mut probe = x.clone();
            probe[j] += direction * step;
            // Use the representable step rather than the requested one.
            let h = probe[j] - x[j];
            *evaluations += 1;
            match residual(probe.as_slice()).and_then(|v| checked_residuals(v, m)) {
                Ok(rp) => {
                    column = Some((rp - r) / h);
                    break;
                }
                Err(FitError::NonFiniteModel { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        match column {
            Some(c) => jac.set_column(j, &c),
            None => log::warn!("jacobian column {j} is degenerate in both directions; treating as zero"),
        }
    }

    Ok(jac)
}

fn column_norms(jac: &DMatrix<f64>) -> Vec<f64> {
    jac.column_iter().map(|c| c.norm()).collect()
}

fn active_columns(jac: &DMatrix<f64>, ratio: f64) -> Vec<usize> {
    let norms = column_norms(jac);
    let max = norms.iter().copied().fold(0.0, f64::max);
    if !(max.is_finite() && max > 0.0) {
        return Vec::new();
    }
    norms
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > ratio * max)
        .map(|(j, _)| j)
        .collect()
}

/// Solve the damped step on the active columns; frozen parameters get a zero step.
fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    active: &[usize],
    mu: f64,
) -> Option<DVector<f64>> {
    let sub = jac.select_columns(active.iter());
    let sub_scale: Vec<f64> = active.iter().map(|&j| scale[j]).collect();
    let h_active = solve_damped_step(&sub, r, &sub_scale, mu)?;

    let mut h = DVector::<f64>::zeros(jac.ncols());
    for (k, &j) in active.iter().enumerate() {
        h[j] = h_active[k];
    }
    Some(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_residual(t: &[f64], y: &[f64]) -> impl FnMut(&[f64]) -> Result<Vec<f64>, FitError> {
        let t = t.to_vec();
        let y = y.to_vec();
        move |p: &[f64]| {
            Ok(t.iter()
                .zip(&y)
                .map(|(&ti, &yi)| p[0] * (-p[1] * ti).exp() - yi)
                .collect())
        }
    }

    fn exp_data() -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 2.5 * (-1.3 * ti).exp()).collect();
        (t, y)
    }

    #[test]
    fn recovers_exponential_decay() {
        let (t, y) = exp_data();
        let mut f = exp_residual(&t, &y);
        let out = LevenbergMarquardt::default()
            .minimize(&[1.0, 0.5], &mut f, &Tolerances::default())
            .unwrap();

        assert!(out.termination.is_converged(), "{:?}", out.termination);
        assert!((out.params[0] - 2.5).abs() < 1e-6, "a={}", out.params[0]);
        assert!((out.params[1] - 1.3).abs() < 1e-6, "b={}", out.params[1]);
        assert!(out.cost < 1e-12);
        assert!(out.cost < out.initial_cost);
    }

    #[test]
    fn exact_start_converges_immediately() {
        let (t, y) = exp_data();
        let mut f = exp_residual(&t, &y);
        let out = LevenbergMarquardt::default()
            .minimize(&[2.5, 1.3], &mut f, &Tolerances::default())
            .unwrap();
        assert!(out.termination.is_converged());
        assert_eq!(out.iterations, 0);
    }

    #[test]
    fn tiny_budget_reports_failure_with_best_iterate() {
        let (t, y) = exp_data();
        let mut f = exp_residual(&t, &y);
        let tol = Tolerances {
            max_iterations: 1,
            ..Tolerances::default()
        };
        let out = LevenbergMarquardt::default().minimize(&[10.0, 0.05], &mut f, &tol).unwrap();
        assert_eq!(out.termination, Termination::ConvergenceFailure { iterations: 1 });
        assert!(out.params.iter().all(|v| v.is_finite()));
        assert!(out.cost <= out.initial_cost);
    }

    #[test]
    fn degenerate_initial_guess_fails_fast() {
        let mut calls = 0;
        let mut f = |_: &[f64]| -> Result<Vec<f64>, FitError> {
            calls += 1;
            Err(FitError::non_finite("peak is zero"))
        };
        let err = LevenbergMarquardt::default()
            .minimize(&[1.0], &mut f, &Tolerances::default())
            .unwrap_err();
        assert!(matches!(err, FitError::NonFiniteModel { .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn degenerate_trial_steps_are_rejected_not_fatal() {
        // Minimize (p - 3)² but declare p > 2.5 degenerate on the way; the
        // solver must back off and settle at the boundary region instead of erroring.
        let mut f = |p: &[f64]| -> Result<Vec<f64>, FitError> {
            if p[0] > 2.5 {
                return Err(FitError::non_finite("out of domain"));
            }
            Ok(vec![p[0] - 3.0])
        };
        let out = LevenbergMarquardt::default()
            .minimize(&[0.0], &mut f, &Tolerances::default())
            .unwrap();
        assert!(out.params[0] <= 2.5);
        assert!(out.cost < out.initial_cost);
        assert!(out.history.iter().any(|h| h.outcome == StepOutcome::Degenerate));
    }

    #[test]
    fn insensitive_parameter_is_left_alone() {
        // Residual ignores p[1]; its value must not drift.
        let (t, y) = exp_data();
        let mut inner = exp_residual(&t, &y);
        let mut f = |p: &[f64]| inner(&[p[0], 1.3]);
        let out = LevenbergMarquardt::default()
            .minimize(&[1.0, 7.0], &mut f, &Tolerances::default())
            .unwrap();
        assert_eq!(out.params[1], 7.0);
        assert!((out.params[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (t, y) = exp_data();
        let mut f1 = exp_residual(&t, &y);
        let mut f2 = exp_residual(&t, &y);
        let lm = LevenbergMarquardt::default();
        let a = lm.minimize(&[1.0, 0.5], &mut f1, &Tolerances::default()).unwrap();
        let b = lm.minimize(&[1.0, 0.5], &mut f2, &Tolerances::default()).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.iterations, b.iterations);
    }
}
