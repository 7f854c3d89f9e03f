//! Terminal output for the `xsec` commands.

pub mod format;

pub use format::*;
