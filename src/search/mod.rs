//! Choosing where to calculate cross sections.
//!
//! - `range`: coefficient bounds from a coarse scan, and the grid spanning them
//! - `interval`: fixed-interval grids and uniform draws inside bounds

pub mod interval;
pub mod range;

pub use interval::{interval_points, sample_uniform};
pub use range::{LOOP_CUTOFF, find_bounds, get_points, grid_from_bounds};
