//! Error types.
//!
//! - `FitError` is the typed failure taxonomy of the numerical core
//!   (interpolation, residual evaluation, optimization).
//! - `AppError` is what the binary reports: a message plus a process exit code.
//!
//! Non-convergence is deliberately absent from `FitError`: an exhausted
//! iteration budget still produces a `FitResult`, flagged via
//! `domain::Termination::ConvergenceFailure`.

use thiserror::Error;

/// Failures raised by the fitting core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The empirical series cannot be interpolated.
    #[error("insufficient data: need at least 2 distinct samples, found {found}")]
    InsufficientData { found: usize },

    /// The forward model left the valid region (NaN/inf or non-positive peak).
    #[error("non-finite model output: {reason}")]
    NonFiniteModel { reason: String },

    /// The evaluation grid violates its construction rules.
    #[error("invalid time grid: {0}")]
    InvalidGrid(String),

    /// Any other precondition on caller-supplied values.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl FitError {
    pub fn non_finite(reason: impl Into<String>) -> Self {
        FitError::NonFiniteModel {
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::InvalidGrid(_) | FitError::InvalidInput(_) => 2,
            FitError::InsufficientData { .. } => 3,
            FitError::NonFiniteModel { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}
