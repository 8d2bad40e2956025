//! Numerical building blocks: grids, interpolation, linear and nonlinear least squares.

pub mod grid;
pub mod interp;
pub mod lm;
pub mod ols;

pub use grid::*;
pub use interp::*;
pub use lm::*;
pub use ols::*;
