//! Targets: one buildable unit per source directory.
//!
//! Construction classifies a directory's files, extracts facts from each
//! Go source, picks the package identity and qualified name, and computes
//! where the artifact is produced and installed. Resolution and building
//! happen later, against the [`Registry`](crate::core::registry::Registry).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use walkdir::WalkDir;

use crate::core::dir_config::DirConfig;
use crate::core::facts::{extract_file, ScanMode, SourceFacts, DOCUMENTATION_PACKAGE};
use crate::core::registry::TargetId;
use crate::core::report::Report;
use crate::util::context::GlobalContext;
use crate::util::fs::{base_name, clean_path, is_inside, mtime, relative_path, slash_path, Mtime};

/// Names a hand-written build script may have.
pub const BUILD_SCRIPTS: &[&str] = &["Makefile", "makefile"];

/// Implicit import of every command.
pub const RUNTIME_IMPORT: &str = "runtime";

/// Standard-library packages that can only be built by their script.
const FORCE_BUILD_SCRIPT: &[&str] = &[
    "math",
    "go/build",
    "os",
    "hash/crc32",
    "syscall",
    "runtime",
    "crypto/tls",
    "godoc",
];

/// Why a directory did not become a target.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("no source files")]
    NoSourceFiles,

    #[error("interop sources are not supported in commands")]
    NativeCmdUnsupported,

    #[error("package \"{0}\" is not built on this platform")]
    PlatformFiltered(String),

    #[error("package is not under {}", .0.display())]
    OutsidePackageRoot(PathBuf),

    #[error("directory opts out")]
    OptOut,

    #[error("source file {} disappeared during the scan", .0.display())]
    SourceVanished(PathBuf),

    #[error("standard-library package without a build script is not meant to be built")]
    StdlibWithoutBuildScript,

    #[error("package has no name specified; set `target=` in gb.cfg or run gb from above")]
    Unnamed,
}

/// Discriminator between archives and executables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Library,
    Command,
}

impl TargetKind {
    /// Word used in status lines.
    pub fn describe(self) -> &'static str {
        match self {
            TargetKind::Library => "package",
            TargetKind::Command => "command",
        }
    }
}

/// Where a target's sources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Inside the toolchain's standard-library tree.
    Stdlib,
    /// Inside the `src` of an external root.
    External(PathBuf),
    /// Under the working root.
    Local,
}

impl Provenance {
    /// Artifacts are produced directly at their install location.
    pub fn installs_in_place(&self) -> bool {
        !matches!(self, Provenance::Local)
    }
}

/// What to read while scanning.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Parse test files fully.
    pub with_tests: bool,
    /// Libraries take part in the run.
    pub do_pkgs: bool,
    /// Commands take part in the run.
    pub do_cmds: bool,
    /// Record the working-root pointer in every scanned directory.
    pub write_workspace: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            with_tests: false,
            do_pkgs: true,
            do_cmds: true,
            write_workspace: false,
        }
    }
}

/// The directory a target is being constructed for.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    /// Naming hint inherited from the parent directory.
    pub base: &'a str,
    /// Directory, relative to the working root unless absolute.
    pub dir: &'a Path,
    /// Enclosing `testdata` directory, if any.
    pub testdata: Option<&'a Path>,
    pub config: &'a DirConfig,
}

/// Source files of a target, grouped by role.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    /// Plain Go sources by declared package.
    pub go: BTreeMap<String, Vec<String>>,
    /// Go sources importing the interop pseudo-package, by package.
    pub interop: BTreeMap<String, Vec<String>>,
    /// Test sources by declared package.
    pub tests: BTreeMap<String, Vec<String>>,
    pub asm: Vec<String>,
    pub c: Vec<String>,
    pub headers: Vec<String>,
    /// Files that match no live package or failed to parse.
    pub dead: Vec<String>,
}

/// Mutable per-run status, guarded by the target's mutex.
#[derive(Debug, Default)]
pub struct TargetState {
    /// Status has been computed for this run
    pub checked: bool,
    /// Newest of sources, external archives and dependency artifacts
    pub inbound_time: Mtime,
    pub needs_build: bool,
    pub needs_install: bool,
    pub artifact_time: Mtime,
    pub installed_time: Mtime,
    pub built: bool,
    pub installed: bool,
    pub cleaned: bool,
    pub tested: bool,
    pub failed: bool,
}

/// A buildable directory.
#[derive(Debug)]
pub struct Target {
    pub dir: PathBuf,
    pub abs_dir: PathBuf,
    /// Naming hint passed on to child directories.
    pub base: String,
    /// Qualified name, used as the import path of libraries.
    pub name: String,
    /// Local package identity.
    pub package: String,
    pub kind: TargetKind,
    pub provenance: Provenance,
    pub testdata_root: Option<PathBuf>,
    /// Whether the run's package/command filter selects this target.
    pub active: bool,
    pub sources: SourceSet,
    pub imports: BTreeSet<String>,
    pub test_imports: BTreeSet<String>,
    /// Test and benchmark functions by test package.
    pub test_functions: BTreeMap<String, Vec<String>>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub gcflags: Vec<String>,
    pub interop: bool,
    pub has_build_script: bool,
    pub must_use_build_script: bool,
    pub result_path: PathBuf,
    pub install_path: PathBuf,
    pub source_time: Mtime,

    // Filled in by the resolver.
    pub deps: Vec<TargetId>,
    pub test_deps: Vec<TargetId>,
    pub external_time: Mtime,
    /// Remote-shaped imports not found in the registry.
    pub remote_imports: Vec<String>,
    /// Remote imports with no installed archive yet.
    pub missing_remote: Vec<String>,
    pub unresolved: Vec<String>,

    state: Mutex<TargetState>,
}

/// Files in a directory, sorted and split by kind.
#[derive(Debug, Default)]
struct Classified {
    go: Vec<String>,
    tests: Vec<String>,
    asm: Vec<String>,
    c: Vec<String>,
    headers: Vec<String>,
}

impl Target {
    /// Build a target for `site`, or explain why the directory is not one.
    ///
    /// Unparseable sources are reported to `report` and left out; they do
    /// not fail construction.
    pub fn new(
        ctx: &GlobalContext,
        settings: &ScanSettings,
        site: Site<'_>,
        report: &Report,
    ) -> Result<Target, TargetError> {
        let env = ctx.env();
        let platform = env.platform();
        let dir = clean_path(site.dir);
        let abs_dir = clean_path(&ctx.cwd().join(&dir));
        if !abs_dir.is_dir() {
            return Err(TargetError::NotADirectory(abs_dir));
        }

        let provenance = if is_inside(&abs_dir, &env.goroot().join("src")) {
            Provenance::Stdlib
        } else if let Some(gp) = env
            .gopaths()
            .iter()
            .find(|gp| is_inside(&abs_dir, &gp.join("src")))
        {
            Provenance::External(gp.clone())
        } else {
            Provenance::Local
        };

        let files = classify(&abs_dir, ctx);

        let mut parsed: Vec<(String, SourceFacts)> = Vec::new();
        for file in &files.go {
            match extract_file(&abs_dir.join(file), ScanMode::Header, platform) {
                Ok(facts) => parsed.push((file.clone(), facts)),
                Err(e) => {
                    report.record_broken_source(&dir, e.to_string());
                    tracing::debug!("{:?}", miette::Report::new(e));
                }
            }
        }

        // First package wins, except that a later library package
        // replaces an earlier `main`.
        let mut package = String::new();
        let mut override_name: Option<String> = None;
        for (_, facts) in &parsed {
            if facts.package == DOCUMENTATION_PACKAGE {
                continue;
            }
            if package.is_empty() || (package == "main" && facts.package != "main") {
                package = facts.package.clone();
            }
            if override_name.is_none() {
                override_name = facts.target_override.clone();
            }
        }
        if package.is_empty() {
            return Err(TargetError::NoSourceFiles);
        }

        let mut sources = SourceSet {
            asm: files.asm.clone(),
            c: files.c.clone(),
            headers: files.headers.clone(),
            ..SourceSet::default()
        };
        let mut imports = BTreeSet::new();
        let mut cflags = Vec::new();
        let mut ldflags = Vec::new();
        for (file, facts) in &parsed {
            let bucket = if facts.uses_interop() {
                &mut sources.interop
            } else {
                &mut sources.go
            };
            bucket.entry(facts.package.clone()).or_default().push(file.clone());

            if facts.package == package {
                imports.extend(facts.imports.iter().cloned());
                push_unique(&mut cflags, &facts.cflags);
                push_unique(&mut ldflags, &facts.ldflags);
            }
        }
        let interop = sources.interop.contains_key(&package);

        let mut kind = if package == "main" {
            TargetKind::Command
        } else {
            TargetKind::Library
        };
        if kind == TargetKind::Command {
            imports.insert(RUNTIME_IMPORT.to_string());
        }

        let mut test_imports = BTreeSet::new();
        let mut test_functions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in &files.tests {
            if !settings.with_tests {
                sources.tests.entry(package.clone()).or_default().push(file.clone());
                continue;
            }
            match extract_file(&abs_dir.join(file), ScanMode::Full, platform) {
                Ok(facts) => {
                    sources
                        .tests
                        .entry(facts.package.clone())
                        .or_default()
                        .push(file.clone());
                    test_imports.extend(facts.imports.iter().cloned());
                    test_functions.entry(facts.package.clone()).or_default().extend(
                        facts
                            .functions
                            .into_iter()
                            .filter(|f| is_test_func(f, "Test") || is_test_func(f, "Benchmark")),
                    );
                }
                Err(e) => {
                    report.record_broken_source(&dir, e.to_string());
                    tracing::debug!("{:?}", miette::Report::new(e));
                }
            }
        }
        if !test_imports.is_empty() {
            test_imports.insert(RUNTIME_IMPORT.to_string());
        }

        let has_build_script = build_script(&abs_dir).is_some();
        let mut must_use_build_script = false;

        let is_local_named = site.testdata.is_some() || provenance == Provenance::Local;
        let (name, base) = if is_local_named {
            let (name, base) = local_name(ctx, &site, &dir, kind, override_name)?;
            must_use_build_script |= site.config.makefile();
            (name, base)
        } else {
            if override_name.is_some() || site.config.target().is_some() {
                tracing::warn!(
                    "(in {}) target name overrides are ignored outside the working root",
                    dir.display()
                );
            }
            match &provenance {
                Provenance::Stdlib => {
                    let tool_rel = relative_path(&env.stdlib_cmd_src(), &abs_dir);
                    if kind == TargetKind::Library && !tool_rel.starts_with("..") {
                        if interop {
                            return Err(TargetError::NativeCmdUnsupported);
                        }
                        kind = TargetKind::Command;
                        must_use_build_script = true;
                        (slash_path(&tool_rel), site.base.to_string())
                    } else if kind == TargetKind::Library {
                        (rooted_name(&env.stdlib_src(), &abs_dir)?, site.base.to_string())
                    } else {
                        (base_name(&abs_dir), site.base.to_string())
                    }
                }
                Provenance::External(gp) if kind == TargetKind::Library => {
                    (rooted_name(&gp.join("src"), &abs_dir)?, site.base.to_string())
                }
                _ => (base_name(&abs_dir), site.base.to_string()),
            }
        };

        if name == "." || name.is_empty() {
            return Err(TargetError::Unnamed);
        }
        if kind == TargetKind::Command && interop {
            return Err(TargetError::NativeCmdUnsupported);
        }
        if kind == TargetKind::Library && !platform.dir_included(&name) {
            return Err(TargetError::PlatformFiltered(name));
        }
        if provenance == Provenance::Stdlib && site.testdata.is_none() {
            if FORCE_BUILD_SCRIPT.contains(&name.as_str()) {
                must_use_build_script = true;
            }
            if !has_build_script {
                return Err(TargetError::StdlibWithoutBuildScript);
            }
        }

        let file_name = match kind {
            TargetKind::Command => format!("{}{}", name, platform.exe_suffix()),
            TargetKind::Library => format!("{}.a", name),
        };
        let testdata_root = site.testdata.map(|t| clean_path(&ctx.cwd().join(t)));
        let (result_path, install_path) = match (&provenance, &testdata_root) {
            (Provenance::Stdlib, None) => {
                let path = match kind {
                    TargetKind::Command => env.gobin().join(&file_name),
                    TargetKind::Library => env.stdlib_pkg_dir().join(&file_name),
                };
                (path.clone(), path)
            }
            (Provenance::External(gp), None) => {
                let path = match kind {
                    TargetKind::Command => gp.join("bin").join(&file_name),
                    TargetKind::Library => env.gopath_pkg_dir(gp).join(&file_name),
                };
                (path.clone(), path)
            }
            _ => {
                let out_root = testdata_root.clone().unwrap_or_else(|| ctx.cwd().to_path_buf());
                match kind {
                    TargetKind::Command => (
                        out_root.join("bin").join(&file_name),
                        ctx.install_dir_cmd().join(&file_name),
                    ),
                    TargetKind::Library => (
                        out_root.join("_obj").join(&file_name),
                        ctx.install_dir_pkg().join(&file_name),
                    ),
                }
            }
        };

        let active = match kind {
            TargetKind::Library => settings.do_pkgs,
            TargetKind::Command => settings.do_cmds,
        };

        let mut target = Target {
            dir,
            abs_dir,
            base,
            name,
            package,
            kind,
            provenance,
            testdata_root,
            active,
            sources,
            imports,
            test_imports,
            test_functions,
            cflags,
            ldflags,
            gcflags: site.config.gcflags(),
            interop,
            has_build_script,
            must_use_build_script,
            state: Mutex::new(TargetState {
                artifact_time: mtime(&result_path),
                installed_time: mtime(&install_path),
                ..TargetState::default()
            }),
            result_path,
            install_path,
            source_time: None,
            deps: Vec::new(),
            test_deps: Vec::new(),
            external_time: None,
            remote_imports: Vec::new(),
            missing_remote: Vec::new(),
            unresolved: Vec::new(),
        };

        let all_candidates: Vec<String> = files
            .go
            .iter()
            .chain(&files.asm)
            .chain(&files.c)
            .cloned()
            .collect();
        let live: BTreeSet<String> = target.live_sources().into_iter().collect();
        target.sources.dead = all_candidates
            .into_iter()
            .filter(|f| !live.contains(f))
            .collect();

        let mut newest: Mtime = None;
        for file in live.iter().chain(target.test_sources().iter()) {
            let path = target.abs_dir.join(file);
            match mtime(&path) {
                Some(t) => newest = newest.max(Some(t)),
                None => return Err(TargetError::SourceVanished(path)),
            }
        }
        target.source_time = newest;

        Ok(target)
    }

    /// Lock this target's run state. The guard is released on every exit
    /// path; a panic in another holder does not wedge the target.
    pub fn lock(&self) -> MutexGuard<'_, TargetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-read artifact and install timestamps from disk.
    pub fn refresh_times(&self, state: &mut TargetState) {
        state.artifact_time = mtime(&self.result_path);
        state.installed_time = mtime(&self.install_path);
    }

    pub fn is_command(&self) -> bool {
        self.kind == TargetKind::Command
    }

    /// Plain Go sources of the live package.
    pub fn go_sources(&self) -> &[String] {
        self.sources.go.get(&self.package).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Interop Go sources of the live package.
    pub fn interop_sources(&self) -> &[String] {
        self.sources
            .interop
            .get(&self.package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Files compiled into the artifact.
    pub fn live_sources(&self) -> Vec<String> {
        let mut live: Vec<String> = self
            .go_sources()
            .iter()
            .chain(self.interop_sources())
            .chain(&self.sources.asm)
            .cloned()
            .collect();
        if self.interop {
            live.extend(self.sources.c.iter().cloned());
        }
        live
    }

    pub fn test_sources(&self) -> Vec<String> {
        self.sources.tests.values().flatten().cloned().collect()
    }

    pub fn has_tests(&self) -> bool {
        self.sources.tests.values().any(|files| !files.is_empty())
    }

    /// Short label for scan listings.
    pub fn label(&self) -> String {
        let mut label = match (self.kind, self.interop) {
            (TargetKind::Command, _) => "cmd".to_string(),
            (TargetKind::Library, true) => "cgo".to_string(),
            (TargetKind::Library, false) => "pkg".to_string(),
        };
        if self.testdata_root.is_some() {
            label = format!("testdata {label}");
        }
        match &self.provenance {
            Provenance::Stdlib => format!("GOROOT {label}"),
            Provenance::External(gp) => format!("GOPATH={} {label}", gp.display()),
            Provenance::Local => label,
        }
    }
}

/// Name relative to a package root, rejecting directories outside it.
fn rooted_name(root: &Path, abs_dir: &Path) -> Result<String, TargetError> {
    let rel = relative_path(root, abs_dir);
    if rel.starts_with("..") {
        return Err(TargetError::OutsidePackageRoot(root.to_path_buf()));
    }
    Ok(slash_path(&rel))
}

/// Naming for targets under the working root (or inside testdata).
fn local_name(
    ctx: &GlobalContext,
    site: &Site<'_>,
    dir: &Path,
    kind: TargetKind,
    override_name: Option<String>,
) -> Result<(String, String), TargetError> {
    let cwd_name = base_name(ctx.cwd());
    let dir_slash = slash_path(dir);

    let (mut name, mut base) = match override_name {
        Some(name) => (name.clone(), name),
        None if kind == TargetKind::Command => {
            let name = if dir_slash.is_empty() {
                cwd_name
            } else {
                base_name(dir)
            };
            (name, site.base.to_string())
        }
        None => {
            let mut name = if site.base == "." || site.base.is_empty() {
                cwd_name
            } else {
                site.base.to_string()
            };
            for prefix in ["src/pkg", "src"] {
                if site.base == dir_slash
                    && dir.starts_with(prefix)
                    && dir_slash != prefix
                {
                    name = slash_path(&relative_path(Path::new(prefix), dir));
                    break;
                }
            }
            (name, site.base.to_string())
        }
    };

    if site.config.opts_out() {
        return Err(TargetError::OptOut);
    }
    if let Some(cfg_name) = site.config.target() {
        name = cfg_name.to_string();
        base = name.clone();
    }

    Ok((slash_path(&clean_path(Path::new(&name))), base))
}

fn classify(abs_dir: &Path, ctx: &GlobalContext) -> Classified {
    let platform = ctx.platform();
    let mut files = Classified::default();

    let entries = WalkDir::new(abs_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.starts_with('#') {
            continue;
        }
        if name.ends_with("_testmain.go")
            || name.starts_with("_cgo_")
            || name.contains(".cgo1.")
            || name.contains(".cgo2.")
        {
            continue;
        }
        if !platform.file_included(&name) {
            continue;
        }
        if let Some(stem) = name.strip_suffix(".pb.go") {
            if abs_dir.join(format!("{stem}.proto")).is_file() {
                continue;
            }
        }

        if name.ends_with("_test.go") {
            files.tests.push(name);
        } else if name.ends_with(".go") {
            files.go.push(name);
        } else if name.ends_with(".s") {
            files.asm.push(name);
        } else if name.ends_with(".c") {
            files.c.push(name);
        } else if name.ends_with(".h") {
            files.headers.push(name);
        }
    }
    files
}

fn is_test_func(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => !rest.starts_with(|c: char| c.is_lowercase()),
        None => false,
    }
}

/// The build script in `dir`, if any.
pub fn build_script(dir: &Path) -> Option<&'static str> {
    BUILD_SCRIPTS.iter().copied().find(|name| dir.join(name).is_file())
}

fn push_unique(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn construct(fx: &Fixture, dir: &str, base: &str) -> Result<Target, TargetError> {
        let cfg = DirConfig::read(&fx.root().join(dir));
        let site = Site {
            base,
            dir: Path::new(dir),
            testdata: None,
            config: &cfg,
        };
        Target::new(&fx.ctx(), &ScanSettings::default(), site, &Report::new())
    }

    #[test]
    fn test_library_naming() {
        let fx = Fixture::new();
        fx.file("util/util.go", "package util\n\nimport \"fmt\"\n");

        let t = construct(&fx, "util", "util").unwrap();
        assert_eq!(t.name, "util");
        assert_eq!(t.package, "util");
        assert_eq!(t.kind, TargetKind::Library);
        assert_eq!(t.provenance, Provenance::Local);
        assert_eq!(t.result_path, fx.root().join("_obj").join("util.a"));
        assert!(t.imports.contains("fmt"));
        assert!(t.source_time.is_some());
    }

    #[test]
    fn test_command_naming_uses_dir_basename() {
        let fx = Fixture::new();
        fx.file("cmds/greet/main.go", "package main\n\nimport \"util\"\n");

        let t = construct(&fx, "cmds/greet", "cmds/greet").unwrap();
        assert_eq!(t.name, "greet");
        assert!(t.is_command());
        assert!(t.imports.contains("runtime"));
        assert_eq!(t.result_path, fx.root().join("bin").join("greet"));
    }

    #[test]
    fn test_src_prefix_stripped() {
        let fx = Fixture::new();
        fx.file("src/pkg/encoding/thing/a.go", "package thing\n");
        fx.file("src/other/b.go", "package other\n");

        let t = construct(&fx, "src/pkg/encoding/thing", "src/pkg/encoding/thing").unwrap();
        assert_eq!(t.name, "encoding/thing");
        let t = construct(&fx, "src/other", "src/other").unwrap();
        assert_eq!(t.name, "other");
    }

    #[test]
    fn test_in_source_override() {
        let fx = Fixture::new();
        fx.file("x/a.go", "//target:tools/x\npackage x\n");
        let t = construct(&fx, "x", "x").unwrap();
        assert_eq!(t.name, "tools/x");
        assert_eq!(t.base, "tools/x");
    }

    #[test]
    fn test_config_target_beats_source_override() {
        let fx = Fixture::new();
        fx.file("x/a.go", "//target:from/source\npackage x\n");
        fx.file("x/gb.cfg", "target=from/config\n");
        let t = construct(&fx, "x", "x").unwrap();
        assert_eq!(t.name, "from/config");
    }

    #[test]
    fn test_opt_out() {
        let fx = Fixture::new();
        fx.file("x/a.go", "package x\n");
        fx.file("x/gb.cfg", "target=-\n");
        assert!(matches!(construct(&fx, "x", "x"), Err(TargetError::OptOut)));
    }

    #[test]
    fn test_no_sources() {
        let fx = Fixture::new();
        fx.file("docs/README", "hello\n");
        fx.file("docs/doc.go", "package documentation\n");
        assert!(matches!(
            construct(&fx, "docs", "docs"),
            Err(TargetError::NoSourceFiles)
        ));
    }

    #[test]
    fn test_build_script_either_case() {
        let fx = Fixture::new();
        fx.file("upper/u.go", "package upper\n");
        fx.file("upper/Makefile", "all:\n");
        fx.file("lower/l.go", "package lower\n");
        fx.file("lower/makefile", "all:\n");
        fx.file("none/n.go", "package none\n");

        assert!(construct(&fx, "upper", "upper").unwrap().has_build_script);
        assert!(construct(&fx, "lower", "lower").unwrap().has_build_script);
        assert!(!construct(&fx, "none", "none").unwrap().has_build_script);
    }

    #[test]
    fn test_dead_sources() {
        let fx = Fixture::new();
        fx.file("util/a.go", "package util\n");
        fx.file("util/z.go", "package other\n\nimport \"no/such\"\n");
        fx.file("util/broken.go", "this is not go\n");

        let report = Report::new();
        let cfg = DirConfig::default();
        let site = Site {
            base: "util",
            dir: Path::new("util"),
            testdata: None,
            config: &cfg,
        };
        let t = Target::new(&fx.ctx(), &ScanSettings::default(), site, &report).unwrap();
        assert_eq!(t.go_sources(), ["a.go".to_string()]);
        assert_eq!(t.sources.dead, vec!["broken.go".to_string(), "z.go".to_string()]);
        assert!(!t.imports.contains("no/such"));
        assert_eq!(report.summary().broken_sources, 1);

        let mut registry = fx.scan();
        let errors = crate::resolver::resolve_all(
            &mut registry,
            &fx.ctx(),
            &Default::default(),
            &Report::new(),
        );
        assert!(errors.is_empty());
        let util = registry.lookup_import("util").unwrap();
        assert!(registry.get(util).deps.is_empty());
    }

    #[test]
    fn test_library_replaces_main() {
        let fx = Fixture::new();
        fx.file("tool/a.go", "package main\n");
        fx.file("tool/b.go", "package tool\n");
        let t = construct(&fx, "tool", "tool").unwrap();
        assert_eq!(t.package, "tool");
        assert_eq!(t.kind, TargetKind::Library);
        assert_eq!(t.sources.dead, vec!["a.go".to_string()]);
    }

    #[test]
    fn test_interop_command_rejected() {
        let fx = Fixture::new();
        fx.file("c/main.go", "package main\n\nimport \"C\"\n");
        assert!(matches!(
            construct(&fx, "c", "c"),
            Err(TargetError::NativeCmdUnsupported)
        ));
    }

    #[test]
    fn test_interop_library() {
        let fx = Fixture::new();
        fx.file(
            "z/z.go",
            "package z\n\n// #cgo LDFLAGS: -lz\nimport \"C\"\n",
        );
        fx.file("z/helper.c", "int x;\n");
        let t = construct(&fx, "z", "z").unwrap();
        assert!(t.interop);
        assert_eq!(t.ldflags, vec!["-lz"]);
        assert_eq!(t.interop_sources(), ["z.go".to_string()]);
        assert!(t.sources.dead.is_empty());
        assert_eq!(t.label(), "cgo");
    }

    #[test]
    fn test_platform_filtered_files() {
        let fx = Fixture::new();
        fx.file("p/p.go", "package p\n");
        fx.file("p/p_windows.go", "package p\n\nimport \"syscall\"\n");
        let t = construct(&fx, "p", "p").unwrap();
        assert_eq!(t.go_sources(), ["p.go".to_string()]);
        assert!(!t.imports.contains("syscall"));
    }

    #[test]
    fn test_platform_filtered_dir() {
        let fx = Fixture::new();
        fx.file("sys/windows/w.go", "package windows\n");
        assert!(matches!(
            construct(&fx, "sys/windows", "sys/windows"),
            Err(TargetError::PlatformFiltered(_))
        ));
    }

    #[test]
    fn test_test_functions_collected() {
        let fx = Fixture::new();
        fx.file("m/m.go", "package m\n");
        fx.file(
            "m/m_test.go",
            "package m\n\nimport \"testing\"\n\nfunc TestA(t *testing.T) {}\nfunc Testify() {}\nfunc BenchmarkB(b *testing.B) {}\nfunc helper() {}\n",
        );
        fx.file(
            "m/ext_test.go",
            "package m_test\n\nimport \"testing\"\n\nfunc TestExt(t *testing.T) {}\n",
        );

        let cfg = DirConfig::default();
        let site = Site {
            base: "m",
            dir: Path::new("m"),
            testdata: None,
            config: &cfg,
        };
        let settings = ScanSettings {
            with_tests: true,
            ..ScanSettings::default()
        };
        let t = Target::new(&fx.ctx(), &settings, site, &Report::new()).unwrap();
        assert_eq!(t.test_functions["m"], vec!["TestA", "BenchmarkB"]);
        assert_eq!(t.test_functions["m_test"], vec!["TestExt"]);
        assert!(t.test_imports.contains("testing"));
        assert!(t.has_tests());
    }

    #[test]
    fn test_is_test_func() {
        assert!(is_test_func("Test", "Test"));
        assert!(is_test_func("TestX", "Test"));
        assert!(is_test_func("Test_x", "Test"));
        assert!(!is_test_func("Testify", "Test"));
        assert!(!is_test_func("helper", "Test"));
    }
}
