//! Response-surface fitting and evaluation.
//!
//! Responsibilities:
//!
//! - fit scale factors per scan entry by weighted least squares (`fitter`)
//! - predict scale factors at new points (`evaluate`)

pub mod evaluate;
pub mod fitter;

pub use fitter::SM_WEIGHT;
