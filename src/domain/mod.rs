//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model inputs (`Geometry`, `Coefficients`, `TimeGrid`, `EmpiricalSeries`)
//! - run configuration (`FitConfig`, `GridSpec`, `Tolerances`)
//! - fit outputs (`FitResult`, `Termination`, `CurveFile`)

pub mod types;

pub use types::*;
