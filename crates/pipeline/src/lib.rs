//! Offline batch-construction jobs.
//!
//! Each module backs one CLI subcommand; the logic is kept free of
//! process concerns so it can be unit tested directly.

pub mod compose;
pub mod extract;
pub mod stats;
