//! Test utilities for gb unit tests.
//!
//! [`Fixture`] lays out a throwaway working root next to a minimal
//! toolchain tree, and [`RecordingToolchain`] stands in for the real
//! compiler so the build driver can be exercised without `go` installed.
//!
//! # Example
//!
//! ```rust,ignore
//! let fx = Fixture::new();
//! fx.file("util/util.go", "package util\n");
//! let registry = fx.scan();
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::builder::interop::InteropInput;
use crate::builder::toolchain::{
    ArchiveInput, AssembleInput, CompileInput, LeafError, LinkInput, ScriptGoal, Toolchain,
};
use crate::core::dir_config::DirConfig;
use crate::core::platform::Platform;
use crate::core::registry::Registry;
use crate::core::report::Report;
use crate::core::scanner::Scanner;
use crate::core::target::{ScanSettings, Site, Target};
use crate::util::context::{Environment, GlobalContext};
use crate::util::fs::{clean_path, relative_path, slash_path};
use crate::util::process::ProcessError;

/// Standard-library archives every fixture toolchain ships.
const STDLIB: &[&str] = &["fmt", "os", "regexp", "runtime", "strings", "testing"];

/// A temporary working root plus a toolchain root beside it.
pub struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    goroot: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let base = clean_path(&tmp.path().canonicalize().unwrap());
        let root = base.join("work");
        let goroot = base.join("goroot");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(goroot.join("src")).unwrap();

        let fx = Fixture {
            _tmp: tmp,
            root,
            goroot,
        };
        for name in STDLIB {
            fx.stdlib_archive(name);
            fs::create_dir_all(fx.goroot.join("src").join(name)).unwrap();
        }
        fx
    }

    /// Working root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn goroot(&self) -> &Path {
        &self.goroot
    }

    pub fn env(&self) -> Environment {
        Environment::new(&self.goroot, Platform::new("linux", "amd64").unwrap())
    }

    /// Context for a run started at the working root.
    pub fn ctx(&self) -> GlobalContext {
        self.ctx_in(".")
    }

    /// Context for a run started in `rel` below the working root.
    pub fn ctx_in(&self, rel: &str) -> GlobalContext {
        GlobalContext::with_env(clean_path(&self.root.join(rel)), self.env()).unwrap()
    }

    /// Write a file below the working root, dated an hour back so that
    /// anything built afterwards is newer.
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(3600));
        path
    }

    /// Mark a file below the working root as modified after any build.
    pub fn touch(&self, rel: &str) {
        set_mtime(&self.root.join(rel), SystemTime::now() + Duration::from_secs(60));
    }

    /// Place a prebuilt archive for `name` in the toolchain's package dir.
    pub fn stdlib_archive(&self, name: &str) -> PathBuf {
        let path = self.env().stdlib_pkg_dir().join(format!("{name}.a"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "!<arch>\n").unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(7200));
        path
    }

    /// Construct the target for `dir`, named as if scanned from the root.
    pub fn target(&self, dir: &str) -> Target {
        let cfg = DirConfig::read(&self.root.join(dir));
        let site = Site {
            base: dir,
            dir: Path::new(dir),
            testdata: None,
            config: &cfg,
        };
        Target::new(&self.ctx(), &ScanSettings::default(), site, &Report::new()).unwrap()
    }

    pub fn scan(&self) -> Registry {
        self.scan_with(&self.ctx(), &ScanSettings::default())
    }

    pub fn scan_with_tests(&self) -> Registry {
        let settings = ScanSettings {
            with_tests: true,
            ..ScanSettings::default()
        };
        self.scan_with(&self.ctx(), &settings)
    }

    /// Scan the working root for a run started in `rel`.
    pub fn scan_in(&self, rel: &str) -> Registry {
        self.scan_with(&self.ctx_in(rel), &ScanSettings::default())
    }

    fn scan_with(&self, ctx: &GlobalContext, settings: &ScanSettings) -> Registry {
        let report = Report::new();
        let mut registry = Registry::new();
        Scanner::new(ctx, settings, &report).scan_root(&mut registry);
        registry
    }

    pub fn toolchain(&self) -> RecordingToolchain {
        RecordingToolchain::new(&self.root)
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Toolchain that records every call and writes placeholder outputs.
///
/// Calls are recorded as `"<op> <dir> <details>"` with `dir` relative to
/// the working root.
#[derive(Debug)]
pub struct RecordingToolchain {
    root: PathBuf,
    calls: Mutex<Vec<String>>,
    fail_dirs: Vec<String>,
}

impl RecordingToolchain {
    pub fn new(root: &Path) -> Self {
        RecordingToolchain {
            root: root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            fail_dirs: Vec::new(),
        }
    }

    /// Fail every operation run in `dir`.
    pub fn fail_in(mut self, dir: &str) -> Self {
        self.fail_dirs.push(dir.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Directories `op` ran in, in call order.
    pub fn leaf_dirs(&self, op: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| {
                let mut parts = c.split(' ');
                (parts.next() == Some(op)).then(|| parts.next().unwrap_or("").to_string())
            })
            .collect()
    }

    /// Remote packages fetched, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.leaf_dirs("fetch")
    }

    /// Artifacts copied to an install location, relative to the root.
    pub fn copied(&self) -> Vec<String> {
        self.leaf_dirs("copy")
    }

    fn rel(&self, path: &Path) -> String {
        slash_path(&relative_path(&self.root, path))
    }

    fn record(&self, op: &str, dir: &Path, details: String) -> Result<(), LeafError> {
        let rel = self.rel(dir);
        self.calls
            .lock()
            .unwrap()
            .push(format!("{op} {rel} {details}").trim_end().to_string());
        if self.fail_dirs.contains(&rel) {
            return Err(LeafError::Process(ProcessError::Failed {
                command: op.to_string(),
                code: Some(1),
                stderr: format!("{rel}: forced failure"),
            }));
        }
        Ok(())
    }

    fn produce(&self, output: &Path) -> Result<(), LeafError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| LeafError::io("create directory", parent, e))?;
        }
        fs::write(output, "").map_err(|e| LeafError::io("write", output, e))
    }
}

fn joined(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Toolchain for RecordingToolchain {
    fn compile(&self, input: &CompileInput) -> Result<(), LeafError> {
        let details = format!("{} {}", input.import_path, joined(&input.sources));
        self.record("compile", &input.dir, details)?;
        self.produce(&input.output)
    }

    fn assemble(&self, input: &AssembleInput) -> Result<(), LeafError> {
        self.record("assemble", &input.dir, input.source.display().to_string())?;
        self.produce(&input.output)
    }

    fn link(&self, input: &LinkInput) -> Result<(), LeafError> {
        self.record("link", &input.dir, self.rel(&input.output))?;
        self.produce(&input.output)
    }

    fn archive(&self, input: &ArchiveInput) -> Result<(), LeafError> {
        self.record("archive", &input.dir, self.rel(&input.output))?;
        self.produce(&input.output)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), LeafError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("copy {} {}", self.rel(src), dst.display()));
        crate::util::fs::copy_file(src, dst).map_err(|e| LeafError::io("copy", src, e))
    }

    fn fetch_remote(&self, name: &str, update: bool) -> Result<(), LeafError> {
        let flag = if update { "-u" } else { "" };
        self.calls
            .lock()
            .unwrap()
            .push(format!("fetch {name} {flag}").trim_end().to_string());
        Ok(())
    }

    fn run_build_script(&self, dir: &Path, goal: ScriptGoal) -> Result<(), LeafError> {
        self.record("script", dir, goal.args().join(" "))
    }

    fn build_interop(&self, input: &InteropInput) -> Result<(), LeafError> {
        self.record("interop", &input.dir, input.interop_sources.join(" "))?;
        self.produce(&input.output)
    }

    fn run_test_binary(&self, dir: &Path, binary: &Path, args: &[String]) -> Result<(), LeafError> {
        let details = format!("{} {}", self.rel(binary), args.join(" "));
        self.record("run", dir, details)
    }
}
