//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - compute normalized residuals between model and measurement (`residual`)
//! - drive interpolation + least squares into a `FitResult` (`fitter`)

pub mod fitter;
pub mod residual;

pub use fitter::*;
pub use residual::*;
