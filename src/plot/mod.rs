//! Plot rendering.
//!
//! - deterministic ASCII plot for the terminal (`ascii`)
//! - PNG chart via Plotters (`chart`)

pub mod ascii;
pub mod chart;

pub use ascii::*;
pub use chart::*;
