//! Cross section scan container.
//!
//! `ScanStore` is a plain data container; fitting and evaluation live in
//! `crate::fit`, archive I/O in `crate::io`.

pub mod store;

pub use store::*;
