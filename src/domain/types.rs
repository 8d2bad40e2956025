//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::IterationRecord;

/// Transmitter/receiver placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Horizontal separation `d` (m), expected > 0.
    pub horizontal: f64,
    /// Vertical offset `Δh` (m), may be zero or negative.
    pub vertical: f64,
}

impl Geometry {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// `r = sqrt(d² + Δh²)`.
    pub fn effective_distance(&self) -> f64 {
        crate::models::effective_distance(self.horizontal, self.vertical)
    }
}

/// Free parameters of the pulse-response model.
///
/// - `a`: scale
/// - `b`: decay rate (spread)
/// - `c`: transport velocity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Coefficients {
    /// Number of free parameters.
    pub const LEN: usize = 3;

    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Build from an optimizer parameter vector; `None` unless it has exactly 3 entries.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [a, b, c] => Some(Self::new(*a, *b, *c)),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a = {}, b = {}, c = {}", self.a, self.b, self.c)
    }
}

/// Strictly increasing, strictly positive evaluation times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    /// `samples` linearly spaced points over `[start, end]` (inclusive).
    pub fn linspace(start: f64, end: f64, samples: usize) -> Result<Self, FitError> {
        Self::from_points(crate::math::linspace(start, end, samples)?)
    }

    /// Validate an explicit set of grid points.
    pub fn from_points(points: Vec<f64>) -> Result<Self, FitError> {
        let Some(&first) = points.first() else {
            return Err(FitError::InvalidGrid("grid has no points".to_string()));
        };
        if points.iter().any(|t| !t.is_finite()) {
            return Err(FitError::InvalidGrid("grid contains non-finite values".to_string()));
        }
        if first <= 0.0 {
            return Err(FitError::InvalidGrid(format!(
                "grid must start strictly above zero (got {first})"
            )));
        }
        if points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::InvalidGrid("grid must be strictly increasing".to_string()));
        }
        Ok(Self { points })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.points[0]
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for TimeGrid {
    type Error = FitError;

    fn try_from(points: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_points(points)
    }
}

impl From<TimeGrid> for Vec<f64> {
    fn from(grid: TimeGrid) -> Self {
        grid.points
    }
}

/// Measured `(time, amplitude)` samples, amplitudes already peak-normalized.
///
/// Times may be unsorted and irregularly spaced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmpiricalSeries {
    pub times: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl EmpiricalSeries {
    pub fn new(times: Vec<f64>, amplitudes: Vec<f64>) -> Result<Self, FitError> {
        if times.len() != amplitudes.len() {
            return Err(FitError::InvalidInput(format!(
                "series length mismatch: {} times vs {} amplitudes",
                times.len(),
                amplitudes.len()
            )));
        }
        Ok(Self { times, amplitudes })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            times: pairs.iter().map(|p| p.0).collect(),
            amplitudes: pairs.iter().map(|p| p.1).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.amplitudes.iter().copied())
    }
}

/// Evaluation grid bounds as supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub start: f64,
    pub end: f64,
    pub samples: usize,
}

impl GridSpec {
    pub fn build(&self) -> Result<TimeGrid, FitError> {
        TimeGrid::linspace(self.start, self.end, self.samples)
    }
}

/// Convergence thresholds for the least-squares search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Relative cost change.
    pub ftol: f64,
    /// Relative step size.
    pub xtol: f64,
    /// Gradient infinity norm.
    pub gtol: f64,
    /// Maximum number of trial steps.
    pub max_iterations: usize,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            max_iterations: 300,
        }
    }
}

/// Which tolerance stopped the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceReason {
    Gradient,
    StepSize,
    CostChange,
    ZeroCost,
}

/// Terminal state of the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    Converged(ConvergenceReason),
    /// Iteration budget exhausted; the best iterate is still reported.
    ConvergenceFailure { iterations: usize },
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged(ConvergenceReason::Gradient) => {
                write!(f, "converged (gradient tolerance)")
            }
            Termination::Converged(ConvergenceReason::StepSize) => {
                write!(f, "converged (step-size tolerance)")
            }
            Termination::Converged(ConvergenceReason::CostChange) => {
                write!(f, "converged (cost-change tolerance)")
            }
            Termination::Converged(ConvergenceReason::ZeroCost) => write!(f, "converged (zero cost)"),
            Termination::ConvergenceFailure { iterations } => {
                write!(f, "NOT converged: iteration budget exhausted after {iterations} steps")
            }
        }
    }
}

/// Output of a single calibration run.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub initial: Coefficients,
    pub coefficients: Coefficients,
    /// `½ Σ r²` at the initial guess.
    pub initial_cost: f64,
    /// `½ Σ r²` at `coefficients`.
    pub cost: f64,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
    pub geometry: Geometry,
    pub grid: TimeGrid,
    /// Interpolated measurement on `grid`.
    pub target: Vec<f64>,
    /// Peak-normalized model at `coefficients` on `grid`.
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub history: Vec<IterationRecord>,
}

impl FitResult {
    pub fn is_converged(&self) -> bool {
        self.termination.is_converged()
    }

    /// Root-mean-square residual over the grid.
    pub fn rmse(&self) -> f64 {
        if self.residuals.is_empty() {
            return 0.0;
        }
        (2.0 * self.cost / self.residuals.len() as f64).sqrt()
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub data_path: PathBuf,
    pub time_column: String,
    pub amplitude_column: String,

    pub initial: Coefficients,
    pub geometry: Geometry,
    pub grid: GridSpec,
    pub tolerances: Tolerances,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub chart: Option<PathBuf>,
    pub export_results: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}

impl FitConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), FitError> {
        let g = &self.geometry;
        if !(g.horizontal.is_finite() && g.horizontal > 0.0) {
            return Err(FitError::InvalidInput(format!(
                "horizontal separation must be finite and > 0 (got {})",
                g.horizontal
            )));
        }
        if !g.vertical.is_finite() {
            return Err(FitError::InvalidInput("vertical offset must be finite".to_string()));
        }
        if !self.initial.is_finite() {
            return Err(FitError::InvalidInput(format!(
                "initial guess must be finite (got {})",
                self.initial
            )));
        }
        let t = &self.tolerances;
        if !(t.ftol >= 0.0 && t.xtol >= 0.0 && t.gtol >= 0.0) {
            return Err(FitError::InvalidInput("tolerances must be >= 0".to_string()));
        }
        if t.max_iterations == 0 {
            return Err(FitError::InvalidInput("max iterations must be >= 1".to_string()));
        }
        self.grid.build()?;
        Ok(())
    }
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub geometry: Geometry,
    pub initial: Coefficients,
    pub coefficients: Coefficients,
    pub cost: f64,
    pub converged: bool,
    pub termination: Termination,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub t: Vec<f64>,
    pub fitted: Vec<f64>,
    pub measured: Vec<f64>,
}
