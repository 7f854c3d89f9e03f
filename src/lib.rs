//! `xsec-scan` library crate.
//!
//! Cross-section scans over EFT Wilson coefficients: store sampled cross
//! sections, fit the quadratic scale model, and decide where to sample next.
//! The binary (`xsec`) is a thin wrapper around this library so the store and
//! search code can be tested without spawning processes.

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod sample;
pub mod scan;
pub mod search;
