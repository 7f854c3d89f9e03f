//! Mathematical utilities: grids and weighted least squares.

pub mod grid;
pub mod ols;

pub use grid::*;
pub use ols::*;
