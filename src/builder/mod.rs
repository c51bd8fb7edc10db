//! Go build driver.
//!
//! This module decides what is stale, builds, installs, cleans and tests
//! targets, and performs the leaf work through a [`Toolchain`].

pub mod context;
pub mod driver;
pub mod events;
pub mod interop;
pub mod testmain;
pub mod toolchain;

pub use context::{BuildContext, BuildOptions, MessageFormat};
pub use driver::BuildError;
pub use events::BuildEvent;
pub use toolchain::{GoToolchain, LeafError, ScriptGoal, Toolchain};
