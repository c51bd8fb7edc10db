//! Global context for gb runs.
//!
//! Provides centralized access to the toolchain environment and to the
//! directories a run works with: the invocation directory, the working
//! root every target path is relative to, and the output roots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::dir_config::DirConfig;
use crate::core::platform::Platform;
use crate::util::config::{global_config_dir, project_config_path};
use crate::util::fs::{clean_path, is_inside, mtime, Mtime};
use crate::util::process::{find_executable, ProcessBuilder};

/// Fallback toolchain root when neither `GOROOT` nor `go env` answer.
pub const DEFAULT_GOROOT: &str = "/usr/local/go";

/// Toolchain environment: roots, platform and extra flags.
#[derive(Debug, Clone)]
pub struct Environment {
    goroot: PathBuf,
    platform: Platform,
    gobin: PathBuf,
    gopaths: Vec<PathBuf>,
    gcflags: Vec<String>,
    ldflags: Vec<String>,
}

impl Environment {
    /// Environment rooted at `goroot` for `platform`, with no external
    /// roots and no extra flags.
    pub fn new(goroot: impl Into<PathBuf>, platform: Platform) -> Self {
        let goroot = clean_path(&goroot.into());
        Environment {
            gobin: goroot.join("bin"),
            goroot,
            platform,
            gopaths: Vec::new(),
            gcflags: Vec::new(),
            ldflags: Vec::new(),
        }
    }

    /// Read `GOROOT`, `GOOS`, `GOARCH`, `GOBIN`, `GOPATH`, `GCFLAGS` and
    /// `GB_GLDFLAGS` from the process environment.
    pub fn from_process() -> Result<Self> {
        let goroot = match std::env::var_os("GOROOT").filter(|v| !v.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => detect_goroot(),
        };

        let host = Platform::host().ok();
        let os = env_or("GOOS", host.as_ref().map(|p| p.os().to_string()));
        let arch = env_or("GOARCH", host.as_ref().map(|p| p.arch().to_string()));
        let platform = Platform::new(os, arch).context("invalid build platform")?;

        let mut env = Environment::new(goroot, platform);

        if let Some(bin) = std::env::var_os("GOBIN").filter(|v| !v.is_empty()) {
            env.gobin = PathBuf::from(bin);
        }
        if let Some(paths) = std::env::var_os("GOPATH") {
            env.gopaths = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| clean_path(&p))
                .collect();
        }
        env.gcflags = split_flags(std::env::var("GCFLAGS").ok());
        env.ldflags = split_flags(std::env::var("GB_GLDFLAGS").ok());

        tracing::debug!(
            "GOROOT={} platform={} GOPATH={:?}",
            env.goroot.display(),
            env.platform,
            env.gopaths
        );
        Ok(env)
    }

    pub fn with_gopaths(mut self, gopaths: Vec<PathBuf>) -> Self {
        self.gopaths = gopaths.iter().map(|p| clean_path(p)).collect();
        self
    }

    pub fn with_gobin(mut self, gobin: impl Into<PathBuf>) -> Self {
        self.gobin = gobin.into();
        self
    }

    /// Append extra compiler and linker flags.
    pub fn add_flags(&mut self, gcflags: &[String], ldflags: &[String]) {
        self.gcflags.extend(gcflags.iter().cloned());
        self.ldflags.extend(ldflags.iter().cloned());
    }

    pub fn goroot(&self) -> &Path {
        &self.goroot
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn gobin(&self) -> &Path {
        &self.gobin
    }

    pub fn gopaths(&self) -> &[PathBuf] {
        &self.gopaths
    }

    pub fn gcflags(&self) -> &[String] {
        &self.gcflags
    }

    pub fn ldflags(&self) -> &[String] {
        &self.ldflags
    }

    /// Root of standard-library package sources. Older layouts keep
    /// them under `src/pkg`.
    pub fn stdlib_src(&self) -> PathBuf {
        let legacy = self.goroot.join("src").join("pkg");
        if legacy.is_dir() {
            legacy
        } else {
            self.goroot.join("src")
        }
    }

    /// Root of the standard-library tool commands.
    pub fn stdlib_cmd_src(&self) -> PathBuf {
        self.goroot.join("src").join("cmd")
    }

    /// Install directory for standard-library archives.
    pub fn stdlib_pkg_dir(&self) -> PathBuf {
        self.goroot.join("pkg").join(self.platform.pair())
    }

    /// Install directory for archives of an external root.
    pub fn gopath_pkg_dir(&self, gopath: &Path) -> PathBuf {
        gopath.join("pkg").join(self.platform.pair())
    }

    /// Freshness of a prebuilt archive for `name` in the standard-library
    /// or any external-root install location. Outer `None` means no such
    /// archive exists anywhere.
    pub fn prebuilt_archive(&self, name: &str) -> Option<Mtime> {
        let file = format!("{name}.a");
        std::iter::once(self.stdlib_pkg_dir())
            .chain(self.gopaths.iter().map(|gp| self.gopath_pkg_dir(gp)))
            .map(|dir| dir.join(&file))
            .find(|path| path.is_file())
            .map(|path| mtime(&path))
    }

    /// Whether `name` is a standard-library package present as source.
    /// Toolchains that no longer ship prebuilt archives are covered by this.
    pub fn stdlib_source_exists(&self, name: &str) -> bool {
        !name.is_empty() && self.stdlib_src().join(name).is_dir()
    }
}

fn env_or(key: &str, fallback: Option<String>) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .or(fallback)
        .unwrap_or_default()
}

fn split_flags(value: Option<String>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

fn detect_goroot() -> PathBuf {
    let from_go = find_executable("go").and_then(|go| {
        let output = ProcessBuilder::new(go).args(["env", "GOROOT"]).exec_and_check().ok()?;
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!root.is_empty()).then(|| PathBuf::from(root))
    });
    from_go.unwrap_or_else(|| PathBuf::from(DEFAULT_GOROOT))
}

/// Global context containing the environment and run-wide paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Directory gb was invoked from
    oswd: PathBuf,

    /// Working root all target paths are relative to
    cwd: PathBuf,

    /// External root the invocation happened inside of, if any
    running_in_gopath: Option<PathBuf>,

    /// Home directory for global gb data (~/.gb/)
    home: PathBuf,

    env: Environment,
}

impl GlobalContext {
    /// Create a context for the process's current directory and
    /// environment.
    pub fn new() -> Result<Self> {
        let oswd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_env(oswd, Environment::from_process()?)
    }

    /// Create a context for an explicit invocation directory.
    pub fn with_env(oswd: PathBuf, env: Environment) -> Result<Self> {
        let oswd = clean_path(&oswd);
        let (cwd, running_in_gopath) = locate_working_root(&oswd, &env);
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(".gb"));

        Ok(GlobalContext {
            oswd,
            cwd,
            running_in_gopath,
            home,
            env,
        })
    }

    /// Directory gb was invoked from.
    pub fn oswd(&self) -> &Path {
        &self.oswd
    }

    /// Working root.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn platform(&self) -> &Platform {
        self.env.platform()
    }

    pub fn running_in_gopath(&self) -> Option<&Path> {
        self.running_in_gopath.as_deref()
    }

    /// Whether the working root lies inside the standard-library tree.
    pub fn running_in_goroot(&self) -> bool {
        is_inside(&self.cwd, &self.env.goroot().join("src"))
    }

    /// Local library output root.
    pub fn build_dir_pkg(&self) -> PathBuf {
        self.cwd.join("_obj")
    }

    /// Local command output root.
    pub fn build_dir_cmd(&self) -> PathBuf {
        self.cwd.join("bin")
    }

    /// Install directory for local libraries.
    pub fn install_dir_pkg(&self) -> PathBuf {
        match self.env.gopaths().first() {
            Some(gp) => self.env.gopath_pkg_dir(gp),
            None => self.env.stdlib_pkg_dir(),
        }
    }

    /// Install directory for local commands.
    pub fn install_dir_cmd(&self) -> PathBuf {
        match self.env.gopaths().first() {
            Some(gp) => gp.join("bin"),
            None => self.env.gobin().to_path_buf(),
        }
    }

    /// Get the gb home directory (~/.gb/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        project_config_path(&self.cwd)
    }
}

/// Pick the working root for an invocation directory: an enclosing
/// external root's `src`, else a `workspace=` pointer, else the
/// directory itself.
fn locate_working_root(oswd: &Path, env: &Environment) -> (PathBuf, Option<PathBuf>) {
    for gp in env.gopaths() {
        if is_inside(oswd, gp) {
            return (gp.join("src"), Some(gp.clone()));
        }
    }

    if let Some(ws) = DirConfig::read(oswd).workspace() {
        let root = clean_path(&oswd.join(ws));
        tracing::info!("Running gb in workspace {}", root.display());
        return (root, None);
    }

    (oswd.to_path_buf(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn env_for(goroot: &Path) -> Environment {
        Environment::new(goroot, Platform::new("linux", "amd64").unwrap())
    }

    #[test]
    fn test_working_root_defaults_to_invocation_dir() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_env(tmp.path().to_path_buf(), env_for(tmp.path())).unwrap();
        assert_eq!(ctx.cwd(), clean_path(tmp.path()));
        assert_eq!(ctx.build_dir_pkg(), clean_path(tmp.path()).join("_obj"));
        assert!(ctx.running_in_gopath().is_none());
    }

    #[test]
    fn test_working_root_from_workspace_pointer() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("a").join("b");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("gb.cfg"), "workspace=../..\n").unwrap();

        let ctx = GlobalContext::with_env(sub.clone(), env_for(tmp.path())).unwrap();
        assert_eq!(ctx.cwd(), clean_path(tmp.path()));
        assert_eq!(ctx.oswd(), clean_path(&sub));
    }

    #[test]
    fn test_working_root_inside_gopath() {
        let tmp = TempDir::new().unwrap();
        let gp = tmp.path().join("gopath");
        let inside = gp.join("src").join("example.com").join("x");
        fs::create_dir_all(&inside).unwrap();

        let env = env_for(&tmp.path().join("goroot")).with_gopaths(vec![gp.clone()]);
        let ctx = GlobalContext::with_env(inside, env).unwrap();
        assert_eq!(ctx.cwd(), clean_path(&gp).join("src"));
        assert_eq!(ctx.running_in_gopath(), Some(clean_path(&gp).as_path()));
        assert_eq!(ctx.install_dir_cmd(), clean_path(&gp).join("bin"));
    }

    #[test]
    fn test_prebuilt_archive_lookup() {
        let tmp = TempDir::new().unwrap();
        let env = env_for(tmp.path());
        let pkg_dir = env.stdlib_pkg_dir();
        fs::create_dir_all(pkg_dir.join("net")).unwrap();
        fs::write(pkg_dir.join("fmt.a"), "").unwrap();
        fs::write(pkg_dir.join("net").join("http.a"), "").unwrap();

        assert!(env.prebuilt_archive("fmt").is_some());
        assert!(env.prebuilt_archive("net/http").is_some());
        assert!(env.prebuilt_archive("nope").is_none());
    }

    #[test]
    fn test_stdlib_src_layouts() {
        let tmp = TempDir::new().unwrap();
        let env = env_for(tmp.path());
        assert_eq!(env.stdlib_src(), clean_path(tmp.path()).join("src"));

        fs::create_dir_all(tmp.path().join("src").join("pkg")).unwrap();
        assert_eq!(env.stdlib_src(), clean_path(tmp.path()).join("src").join("pkg"));
    }
}
