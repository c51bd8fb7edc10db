//! Target operating system and architecture.
//!
//! Source files and package directories may carry platform tokens in their
//! names (`net_linux.go`, `syscall/windows`). A token that names a known
//! system, architecture or family must agree with the build platform for
//! the file or directory to take part in the build.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Result};

/// Operating systems gb knows how to filter for.
pub const KNOWN_OS: &[&str] = &["windows", "darwin", "freebsd", "openbsd", "linux", "plan9"];

/// Architectures gb knows how to filter for.
pub const KNOWN_ARCH: &[&str] = &["amd64", "386", "arm", "arm64"];

/// Directory names that only build on one particular system.
const REQUIRED_OS: &[(&str, &str)] = &[("wingui", "windows")];

/// A `GOOS`/`GOARCH` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Create a platform, rejecting unknown systems and architectures.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Result<Self> {
        let os = os.into();
        let arch = arch.into();
        if !KNOWN_OS.contains(&os.as_str()) {
            bail!("unknown GOOS `{}`", os);
        }
        if !KNOWN_ARCH.contains(&arch.as_str()) {
            bail!("unknown GOARCH `{}`", arch);
        }
        Ok(Platform { os, arch })
    }

    /// The platform gb itself was compiled for.
    pub fn host() -> Result<Self> {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// `os_arch`, the directory name used under `pkg/` install roots.
    pub fn pair(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }

    /// Suffix appended to command artifacts.
    pub fn exe_suffix(&self) -> &'static str {
        if self.os == "windows" {
            ".exe"
        } else {
            ""
        }
    }

    /// Whether `token` is a platform word at all.
    pub fn is_platform_token(token: &str) -> bool {
        KNOWN_OS.contains(&token)
            || KNOWN_ARCH.contains(&token)
            || matches!(token, "unix" | "posix" | "bsd")
    }

    /// Whether a platform word agrees with this platform.
    pub fn matches(&self, token: &str) -> bool {
        match token {
            "unix" => matches!(self.os.as_str(), "darwin" | "freebsd" | "openbsd" | "linux"),
            "posix" => matches!(
                self.os.as_str(),
                "darwin" | "freebsd" | "openbsd" | "linux" | "windows"
            ),
            "bsd" => matches!(self.os.as_str(), "darwin" | "freebsd" | "openbsd"),
            other => other == self.os || other == self.arch,
        }
    }

    /// Whether a source file belongs to this platform.
    ///
    /// The stem is split on `_`. Every segment after the first that is a
    /// platform word must match, so `file_linux_amd64.go` requires both.
    pub fn file_included(&self, file_name: &str) -> bool {
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => file_name,
        };
        stem.split('_')
            .skip(1)
            .filter(|seg| Self::is_platform_token(seg))
            .all(|seg| self.matches(seg))
    }

    /// Whether a package directory (by slash-separated name) belongs to
    /// this platform.
    pub fn dir_included(&self, name: &str) -> bool {
        name.split('/').all(|seg| {
            let platform_ok = !Self::is_platform_token(seg) || self.matches(seg);
            let required_ok = REQUIRED_OS
                .iter()
                .filter(|(dir, _)| *dir == seg)
                .all(|(_, os)| *os == self.os);
            platform_ok && required_ok
        })
    }

    /// Evaluate an interop directive platform constraint.
    ///
    /// Space-separated options are alternatives; comma-separated terms
    /// within one option must all hold. A leading `!` negates a term.
    pub fn constraint_holds(&self, constraint: &str) -> bool {
        constraint.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(neg) => !self.matches(neg),
                None => self.matches(term),
            })
        })
    }

    /// Whether the file at `path` belongs to this platform.
    pub fn path_included(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| self.file_included(&n.to_string_lossy()))
            .unwrap_or(true)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
