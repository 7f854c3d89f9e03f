//! Polynomial response-surface model.
//!
//! The model is a set of small, pure functions so that the fitter, evaluator
//! and range search can share a single definition of the term layout.

pub mod model;

pub use model::*;
