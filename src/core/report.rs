//! Run-wide accounting of what happened.
//!
//! Targets build concurrently, so every counter and the broken-message list
//! sit behind one mutex. Nothing here ever fails a run by itself; the
//! caller decides the exit status from the final [`Summary`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One failure worth telling the user about at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenEntry {
    pub dir: PathBuf,
    pub message: String,
}

impl fmt::Display for BrokenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(in {}) {}", self.dir.display(), self.message)
    }
}

/// Snapshot of the counters at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub built: usize,
    pub installed: usize,
    pub cleaned: usize,
    pub broken: usize,
    pub broken_sources: usize,
    pub unresolved: usize,
    pub tests_failed: usize,
    pub messages: Vec<BrokenEntry>,
}

impl Summary {
    /// Whether the run should exit with a failure status.
    pub fn failed(&self) -> bool {
        self.broken > 0 || self.unresolved > 0 || self.tests_failed > 0
    }
}

/// Shared run report.
#[derive(Debug, Default)]
pub struct Report {
    inner: Mutex<Summary>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Summary) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn record_built(&self) {
        self.with(|s| s.built += 1);
    }

    pub fn record_installed(&self) {
        self.with(|s| s.installed += 1);
    }

    pub fn record_cleaned(&self) {
        self.with(|s| s.cleaned += 1);
    }

    /// A target failed to build, install or test.
    pub fn record_broken(&self, dir: &Path, message: impl Into<String>) {
        let entry = BrokenEntry {
            dir: dir.to_path_buf(),
            message: message.into(),
        };
        self.with(|s| {
            s.broken += 1;
            s.messages.push(entry);
        });
    }

    /// A source file could not be parsed. The rest of its directory
    /// still takes part in the scan.
    pub fn record_broken_source(&self, dir: &Path, message: impl Into<String>) {
        let entry = BrokenEntry {
            dir: dir.to_path_buf(),
            message: message.into(),
        };
        self.with(|s| {
            s.broken_sources += 1;
            s.messages.push(entry);
        });
    }

    /// An import could not be satisfied.
    pub fn record_unresolved(&self, dir: &Path, message: impl Into<String>) {
        let entry = BrokenEntry {
            dir: dir.to_path_buf(),
            message: message.into(),
        };
        self.with(|s| {
            s.unresolved += 1;
            s.messages.push(entry);
        });
    }

    pub fn record_test_failure(&self, dir: &Path, message: impl Into<String>) {
        let entry = BrokenEntry {
            dir: dir.to_path_buf(),
            message: message.into(),
        };
        self.with(|s| {
            s.tests_failed += 1;
            s.messages.push(entry);
        });
    }

    pub fn summary(&self) -> Summary {
        self.with(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let report = Report::new();
        report.record_built();
        report.record_built();
        report.record_installed();
        report.record_broken(Path::new("a"), "could not build \"a\"");

        let summary = report.summary();
        assert_eq!(summary.built, 2);
        assert_eq!(summary.installed, 1);
        assert_eq!(summary.broken, 1);
        assert!(summary.failed());
        assert_eq!(summary.messages[0].to_string(), "(in a) could not build \"a\"");
    }

    #[test]
    fn test_broken_source_alone_does_not_fail() {
        let report = Report::new();
        report.record_broken_source(Path::new("x"), "x/bad.go:1: expected 'package'");
        let summary = report.summary();
        assert!(!summary.failed());
        assert_eq!(summary.messages.len(), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let report = Report::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| report.record_built());
            }
        });
        assert_eq!(report.summary().built, 8);
    }
}
