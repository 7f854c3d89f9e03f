//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - the canonical coefficient tuple and composite scan key
//! - accepted point shapes (`PointsInput`)
//! - fit and range-search options, and the resulting coefficient bounds

pub mod types;

pub use types::*;
