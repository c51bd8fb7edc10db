//! Build event types for JSON output.
//!
//! These events are emitted, one JSON object per line, when running with
//! `--message-format json`.
//!
//! # Event Types
//!
//! - `target-built`: a target's artifact was produced
//! - `target-failed`: a target could not be built, installed or tested
//! - `target-installed`: an artifact was copied to its install location
//! - `build-finished`: the run completed (success or failure)

use std::path::PathBuf;

use serde::Serialize;

/// A build event emitted during the run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "target-built")]
    TargetBuilt {
        /// Qualified target name
        target: String,
        /// "package" or "command"
        kind: String,
        /// Directory relative to the working root
        dir: PathBuf,
        artifact: PathBuf,
    },

    #[serde(rename = "target-failed")]
    TargetFailed {
        target: String,
        dir: PathBuf,
        message: String,
    },

    #[serde(rename = "target-installed")]
    TargetInstalled {
        target: String,
        dir: PathBuf,
        destination: PathBuf,
    },

    /// Run completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        built: usize,
        installed: usize,
        broken: usize,
    },
}

impl BuildEvent {
    pub fn built(
        target: impl Into<String>,
        kind: impl Into<String>,
        dir: impl Into<PathBuf>,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        BuildEvent::TargetBuilt {
            target: target.into(),
            kind: kind.into(),
            dir: dir.into(),
            artifact: artifact.into(),
        }
    }

    pub fn failed(
        target: impl Into<String>,
        dir: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        BuildEvent::TargetFailed {
            target: target.into(),
            dir: dir.into(),
            message: message.into(),
        }
    }

    pub fn installed(
        target: impl Into<String>,
        dir: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        BuildEvent::TargetInstalled {
            target: target.into(),
            dir: dir.into(),
            destination: destination.into(),
        }
    }

    /// Create a build finished event.
    pub fn finished(
        success: bool,
        duration_ms: u64,
        built: usize,
        installed: usize,
        broken: usize,
    ) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            built,
            installed,
            broken,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
