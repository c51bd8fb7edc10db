//! Per-directory key/value configuration.
//!
//! A directory may hold a `gb.cfg` file of `key=value` lines. Two legacy
//! one-line files are still honored: `target.gb` (the target name) and
//! `workspace.gb` (path to the working root). Writing a config migrates
//! any legacy files into `gb.cfg`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Name of the per-directory configuration file.
pub const CONFIG_FILE: &str = "gb.cfg";

/// Legacy one-line target-name file.
pub const TARGET_FILE: &str = "target.gb";

/// Legacy one-line workspace-path file.
pub const WORKSPACE_FILE: &str = "workspace.gb";

/// Known configuration keys.
pub mod keys {
    pub const WORKSPACE: &str = "workspace";
    pub const TARGET: &str = "target";
    pub const IGNORE: &str = "ignore";
    pub const IGNORE_ALL: &str = "ignoreall";
    pub const MAKEFILE: &str = "makefile";
    pub const GCFLAGS: &str = "gcflags";

    pub const KNOWN: &[&str] = &[WORKSPACE, TARGET, IGNORE, IGNORE_ALL, MAKEFILE, GCFLAGS];
}

/// Parsed contents of a directory's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirConfig {
    entries: BTreeMap<String, String>,
}

impl DirConfig {
    /// Read the configuration for `dir`. A missing file is an empty
    /// config; malformed lines are skipped with a warning.
    pub fn read(dir: &Path) -> Self {
        let mut config = match fs::read_to_string(dir.join(CONFIG_FILE)) {
            Ok(content) => Self::parse(&content, &dir.join(CONFIG_FILE)),
            Err(_) => DirConfig::default(),
        };

        for (file, key) in [(TARGET_FILE, keys::TARGET), (WORKSPACE_FILE, keys::WORKSPACE)] {
            if config.entries.contains_key(key) {
                continue;
            }
            if let Some(value) = read_one_liner(&dir.join(file)) {
                config.entries.insert(key.to_string(), value);
            }
        }

        config
    }

    /// Parse `key=value` lines. Keys are trimmed and lowercased, values
    /// trimmed; blank lines and `#` comments are ignored.
    pub fn parse(content: &str, origin: &Path) -> Self {
        let mut entries = BTreeMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim().to_ascii_lowercase();
                    if !keys::KNOWN.contains(&key.as_str()) {
                        tracing::warn!(
                            "{}:{}: unknown key '{}'",
                            origin.display(),
                            idx + 1,
                            key
                        );
                    }
                    entries.insert(key, value.trim().to_string());
                }
                None => {
                    tracing::warn!(
                        "{}:{}: malformed line (missing '='), skipping",
                        origin.display(),
                        idx + 1
                    );
                }
            }
        }
        DirConfig { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
    }

    /// Relative path from this directory to the working root.
    pub fn workspace(&self) -> Option<&str> {
        self.get(keys::WORKSPACE).filter(|v| !v.is_empty())
    }

    /// Explicit target name.
    pub fn target(&self) -> Option<&str> {
        self.get(keys::TARGET).filter(|v| !v.is_empty())
    }

    /// Whether the target name opts the directory out of the build.
    pub fn opts_out(&self) -> bool {
        matches!(self.target(), Some("-") | Some("--"))
    }

    /// Skip this directory (but still descend into children).
    pub fn ignore(&self) -> bool {
        self.flag(keys::IGNORE).unwrap_or(false) || self.ignore_all()
    }

    /// Skip this directory and everything below it.
    pub fn ignore_all(&self) -> bool {
        self.flag(keys::IGNORE_ALL).unwrap_or(false) || self.target() == Some("--")
    }

    /// Force use of the directory's build script.
    pub fn makefile(&self) -> bool {
        self.flag(keys::MAKEFILE).unwrap_or(false)
    }

    /// Extra compiler flags for this directory.
    pub fn gcflags(&self) -> Vec<String> {
        self.get(keys::GCFLAGS)
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Write `gb.cfg` into `dir` and drop any legacy one-line files.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let mut content = String::new();
        for (key, value) in &self.entries {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;

        for legacy in [TARGET_FILE, WORKSPACE_FILE] {
            let legacy_path = dir.join(legacy);
            if legacy_path.exists() {
                fs::remove_file(&legacy_path)
                    .with_context(|| format!("failed to remove {}", legacy_path.display()))?;
            }
        }
        Ok(())
    }
}

/// Read the first line of a one-line config file.
pub fn read_one_liner(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let line = content.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}
