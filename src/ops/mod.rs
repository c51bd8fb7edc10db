//! High-level operations.
//!
//! This module contains the implementation of gb commands.

pub mod gb_run;
pub mod scan;

pub use gb_run::{run, Mode, RunOptions, RunOutcome};
pub use scan::{listing, print_listing, ScanDetail};
