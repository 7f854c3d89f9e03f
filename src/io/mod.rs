//! Input/output helpers.
//!
//! - scan archives: `load`, `dump`, `loadmany` (`archive`)
//! - grid and bounds exports (`export`)

pub mod archive;
pub mod export;

pub use archive::*;
pub use export::*;
