//! Build context: everything a build pass shares across targets.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::builder::events::BuildEvent;
use crate::builder::toolchain::{LeafError, Toolchain};
use crate::core::registry::{Registry, TargetId};
use crate::core::report::Report;
use crate::core::target::Target;
use crate::util::context::GlobalContext;
use crate::util::fs::Mtime;

/// Output format for build messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageFormat {
    /// Human-readable status lines
    #[default]
    Human,
    /// One JSON event per line
    Json,
}

impl MessageFormat {
    pub fn is_json(self) -> bool {
        self == MessageFormat::Json
    }
}

/// Switches controlling a build pass.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build independent top-level targets in parallel
    pub concurrent: bool,
    /// Worker threads for concurrent builds (None = auto-detect)
    pub jobs: Option<usize>,
    /// Only act on listed targets; their dependencies are not rebuilt
    pub exclusive: bool,
    /// Fetch missing remote packages
    pub allow_fetch: bool,
    /// Refresh remote packages that are already installed
    pub update: bool,
    /// Remove installed artifacts when cleaning
    pub nuke: bool,
    /// Do not ask before removing installed artifacts
    pub force: bool,
    /// Arguments passed to test binaries
    pub test_args: Vec<String>,
    /// Prefer a directory's build script whenever one is present
    pub use_build_scripts: bool,
    pub verbose: bool,
    pub message_format: MessageFormat,
}

/// Shared state of one build pass.
pub struct BuildContext<'a> {
    pub registry: &'a Registry,
    pub gctx: &'a GlobalContext,
    pub toolchain: &'a dyn Toolchain,
    pub options: BuildOptions,
    pub report: &'a Report,

    /// Targets named on the command line
    listed: HashSet<TargetId>,

    /// Remote packages already fetched in this run, with their freshness
    fetched: Mutex<HashMap<String, Mtime>>,
}

impl fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("targets", &self.registry.len())
            .field("cwd", &self.gctx.cwd())
            .field("options", &self.options)
            .field("listed", &self.listed)
            .finish()
    }
}

impl<'a> BuildContext<'a> {
    pub fn new(
        registry: &'a Registry,
        gctx: &'a GlobalContext,
        toolchain: &'a dyn Toolchain,
        options: BuildOptions,
        report: &'a Report,
    ) -> Self {
        BuildContext {
            registry,
            gctx,
            toolchain,
            options,
            report,
            listed: HashSet::new(),
            fetched: Mutex::new(HashMap::new()),
        }
    }

    /// Record which targets were named on the command line.
    pub fn with_listed(mut self, listed: impl IntoIterator<Item = TargetId>) -> Self {
        self.listed = listed.into_iter().collect();
        self
    }

    pub fn target(&self, id: TargetId) -> &'a Target {
        self.registry.get(id)
    }

    pub fn is_listed(&self, id: TargetId) -> bool {
        self.listed.contains(&id)
    }

    /// Whether `id` may be acted upon in this pass.
    pub fn in_scope(&self, id: TargetId) -> bool {
        !self.options.exclusive || self.is_listed(id)
    }

    /// Fetch a remote package at most once per run and return the
    /// freshness of its installed archive.
    pub fn fetch_once(&self, name: &str) -> Result<Mtime, LeafError> {
        let mut fetched = self.fetched.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(time) = fetched.get(name) {
            return Ok(*time);
        }
        self.toolchain.fetch_remote(name, self.options.update)?;
        let time = self.gctx.env().prebuilt_archive(name).flatten();
        fetched.insert(name.to_string(), time);
        Ok(time)
    }

    /// Archive search directories for compiling or linking `target`.
    pub fn search_dirs(&self, target: &Target) -> Vec<PathBuf> {
        let env = self.gctx.env();
        let mut dirs = Vec::new();
        if let Some(testdata) = &target.testdata_root {
            dirs.push(testdata.join("_obj"));
        }
        if target.testdata_root.is_some() || !target.provenance.installs_in_place() {
            dirs.push(self.gctx.build_dir_pkg());
        }
        for gp in env.gopaths() {
            dirs.push(env.gopath_pkg_dir(gp));
        }
        dirs
    }

    /// Emit a machine-readable event when JSON output is on.
    pub fn emit(&self, event: BuildEvent) {
        if self.options.message_format == MessageFormat::Json {
            println!("{}", event.to_json());
        }
    }

    /// Print a human-readable status line unless JSON output is on.
    pub fn status(&self, line: impl fmt::Display) {
        if self.options.message_format == MessageFormat::Human {
            println!("{}", line);
        }
    }
}
