//! Physical model: geometry resolution and the pulse-response forward model.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod geometry;
pub mod pulse;

pub use geometry::*;
pub use pulse::*;
