//! Core data structures for gb.
//!
//! This module contains the foundational types of a run:
//! - Per-file facts and per-directory configuration
//! - Targets and the registry they live in
//! - The scanner that discovers them
//! - The run-wide report

pub mod dir_config;
pub mod facts;
pub mod platform;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod target;

pub use dir_config::DirConfig;
pub use platform::Platform;
pub use registry::{Registry, TargetId};
pub use report::{Report, Summary};
pub use scanner::Scanner;
pub use target::{Provenance, ScanSettings, Target, TargetError, TargetKind, TargetState};
