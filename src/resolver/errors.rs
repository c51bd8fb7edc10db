//! Resolution error types and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during dependency resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("(in {}) could not resolve import \"{import}\"", .dir.display())]
    UnresolvedImport { dir: PathBuf, import: String },

    #[error("import cycle: {}", .targets.join(" -> "))]
    CycleDetected { targets: Vec<String> },
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::UnresolvedImport { dir, import } => {
                Diagnostic::warning(format!("could not resolve import \"{}\"", import))
                    .with_location(dir.clone())
                    .with_context("no target in the tree and no installed archive has this name")
                    .with_suggestion(suggestions::UNRESOLVED)
            }

            ResolveError::CycleDetected { targets } => {
                Diagnostic::error("cycle detected in dependency graph")
                    .with_context(format!("cycle: {}", targets.join(" -> ")))
                    .with_suggestion(suggestions::CYCLE)
            }
        }
    }
}
