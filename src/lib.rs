//! gb - A zero-configuration build orchestrator for Go source trees
//!
//! This crate provides the core library functionality for gb: target
//! discovery, dependency resolution, staleness tracking and the build
//! driver.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities for gb unit tests.
///
/// This module is only available when running tests. It provides a
/// temporary source tree fixture and a toolchain that records its calls.
#[cfg(test)]
pub mod test_support;

pub use core::{Registry, Report, Target, TargetId};
pub use util::context::GlobalContext;
