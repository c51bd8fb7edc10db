//! Configuration file support for gb.
//!
//! gb supports two configuration file locations:
//! - Global: `~/.gb/config.toml` - User-wide defaults
//! - Project: `.gb/config.toml` under the working root - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both. None of this is required: with no
//! files present every setting has a working default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// gb configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// External tool overrides
    pub toolchain: ToolchainSettings,

    /// Network settings
    pub net: NetConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build independent top-level targets concurrently
    pub concurrent: bool,

    /// Number of worker threads for concurrent builds (None = auto-detect)
    pub jobs: Option<usize>,

    /// Extra compiler flags appended to the GCFLAGS environment value
    pub gcflags: Vec<String>,

    /// Extra linker flags appended to the GB_GLDFLAGS environment value
    pub ldflags: Vec<String>,

    /// Prefer a directory's build script whenever one is present
    pub use_build_scripts: bool,
}

/// Paths to external tools. Unset entries are searched on PATH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// The Go toolchain driver
    pub go: Option<PathBuf>,

    /// Build-script runner
    pub make: Option<PathBuf>,

    /// C compiler for interop sources
    pub gcc: Option<PathBuf>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Fetch missing remote packages without passing `-g`
    pub allow_fetch: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.concurrent {
            self.build.concurrent = true;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if !other.build.gcflags.is_empty() {
            self.build.gcflags = other.build.gcflags;
        }
        if !other.build.ldflags.is_empty() {
            self.build.ldflags = other.build.ldflags;
        }
        if other.build.use_build_scripts {
            self.build.use_build_scripts = true;
        }

        if other.toolchain.go.is_some() {
            self.toolchain.go = other.toolchain.go;
        }
        if other.toolchain.make.is_some() {
            self.toolchain.make = other.toolchain.make;
        }
        if other.toolchain.gcc.is_some() {
            self.toolchain.gcc = other.toolchain.gcc;
        }

        if other.net.allow_fetch {
            self.net.allow_fetch = true;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.gb/config.toml)
/// 2. Global config (~/.gb/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global gb config directory (~/.gb).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".gb"))
}

/// Get the project config path (.gb/config.toml) under a working root.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".gb").join("config.toml")
}
