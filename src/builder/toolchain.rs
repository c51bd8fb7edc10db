//! Toolchain abstraction for the leaf operations of a build.
//!
//! The driver decides *whether* something must be compiled, linked,
//! archived, copied or fetched; a [`Toolchain`] decides *how*. The real
//! implementation shells out to `go tool`, `make` and a C compiler; tests
//! substitute a recording implementation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::interop::{self, InteropInput};
use crate::core::platform::Platform;
use crate::util::config::ToolchainSettings;
use crate::util::fs::copy_file;
use crate::util::process::{find_c_compiler, find_executable, ProcessBuilder, ProcessError};

/// Failure of a single leaf operation.
#[derive(Debug, Error)]
pub enum LeafError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("`{0}` is not available; set it under [toolchain] in the gb config or add it to PATH")]
    ToolNotFound(String),

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LeafError {
    pub(crate) fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        LeafError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Directory the compiler runs in
    pub dir: PathBuf,
    /// Import path recorded in the object
    pub import_path: String,
    /// Source files, relative to `dir`
    pub sources: Vec<PathBuf>,
    /// Output object file
    pub output: PathBuf,
    /// Archive search directories
    pub include_dirs: Vec<PathBuf>,
    /// Additional compiler flags
    pub gcflags: Vec<String>,
}

/// Input for an assemble step.
#[derive(Debug, Clone)]
pub struct AssembleInput {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub output: PathBuf,
    pub include_dirs: Vec<PathBuf>,
}

/// Input for an archive step.
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub dir: PathBuf,
    /// Object files to archive
    pub objects: Vec<PathBuf>,
    /// Output archive file
    pub output: PathBuf,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub dir: PathBuf,
    /// Object holding the `main` package
    pub object: PathBuf,
    /// Output executable
    pub output: PathBuf,
    /// Archive search directories
    pub lib_dirs: Vec<PathBuf>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
}

/// What a directory's build script is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptGoal {
    Package,
    Command,
    Install,
    Clean { nuke: bool },
    Test,
}

impl ScriptGoal {
    /// Arguments passed to the script runner.
    pub fn args(self) -> Vec<&'static str> {
        match self {
            ScriptGoal::Package => vec!["clean", "package"],
            ScriptGoal::Command => vec!["clean", "command"],
            ScriptGoal::Install => vec!["clean", "install"],
            ScriptGoal::Clean { nuke: false } => vec!["clean"],
            ScriptGoal::Clean { nuke: true } => vec!["clean", "nuke"],
            ScriptGoal::Test => vec!["test"],
        }
    }
}

/// Leaf operations. Every method blocks until its external tool exits.
pub trait Toolchain: Send + Sync {
    fn compile(&self, input: &CompileInput) -> Result<(), LeafError>;

    fn assemble(&self, input: &AssembleInput) -> Result<(), LeafError>;

    fn link(&self, input: &LinkInput) -> Result<(), LeafError>;

    fn archive(&self, input: &ArchiveInput) -> Result<(), LeafError>;

    /// Copy an artifact, creating the destination directory.
    fn copy(&self, src: &Path, dst: &Path) -> Result<(), LeafError>;

    /// Download and install a remote package.
    fn fetch_remote(&self, name: &str, update: bool) -> Result<(), LeafError>;

    fn run_build_script(&self, dir: &Path, goal: ScriptGoal) -> Result<(), LeafError>;

    /// Build a library with native interop sources into `input.output`.
    fn build_interop(&self, input: &InteropInput) -> Result<(), LeafError>;

    fn run_test_binary(&self, dir: &Path, binary: &Path, args: &[String]) -> Result<(), LeafError>;
}

/// Toolchain backed by the `go` driver.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    /// Path to the `go` driver
    pub go: Option<PathBuf>,
    /// Path to the build-script runner
    pub make: Option<PathBuf>,
    /// Path to the C compiler
    pub gcc: Option<PathBuf>,
    pub platform: Platform,
    pub goroot: PathBuf,
}

impl GoToolchain {
    /// Locate tools from the configured overrides, then PATH, then the
    /// toolchain root. Missing tools only fail the operations needing them.
    pub fn detect(settings: &ToolchainSettings, platform: &Platform, goroot: &Path) -> Self {
        let go = settings
            .go
            .clone()
            .or_else(|| find_executable("go"))
            .or_else(|| {
                let bundled = goroot.join("bin").join(format!("go{}", platform.exe_suffix()));
                bundled.is_file().then_some(bundled)
            });
        let make = settings
            .make
            .clone()
            .or_else(|| find_executable("gomake"))
            .or_else(|| find_executable("make"));
        let gcc = settings.gcc.clone().or_else(find_c_compiler);

        tracing::debug!("go={:?} make={:?} gcc={:?}", go, make, gcc);
        GoToolchain {
            go,
            make,
            gcc,
            platform: platform.clone(),
            goroot: goroot.to_path_buf(),
        }
    }

    fn go(&self) -> Result<&Path, LeafError> {
        self.go
            .as_deref()
            .ok_or_else(|| LeafError::ToolNotFound("go".into()))
    }

    pub(crate) fn gcc(&self) -> Result<&Path, LeafError> {
        self.gcc
            .as_deref()
            .ok_or_else(|| LeafError::ToolNotFound("gcc".into()))
    }

    /// `go tool <tool>` running in `dir` for the configured platform.
    pub(crate) fn go_tool(&self, tool: &str, dir: &Path) -> Result<ProcessBuilder, LeafError> {
        Ok(ProcessBuilder::new(self.go()?)
            .args(["tool", tool])
            .cwd(dir)
            .env("GOROOT", self.goroot.to_string_lossy())
            .env("GOOS", self.platform.os())
            .env("GOARCH", self.platform.arch()))
    }

    pub(crate) fn run(&self, cmd: ProcessBuilder) -> Result<(), LeafError> {
        tracing::debug!("{}", cmd.display_command());
        cmd.exec_and_check()?;
        Ok(())
    }
}

fn search_flags(flag: &str, dirs: &[PathBuf]) -> Vec<String> {
    dirs.iter()
        .flat_map(|d| [flag.to_string(), d.to_string_lossy().into_owned()])
        .collect()
}

impl Toolchain for GoToolchain {
    fn compile(&self, input: &CompileInput) -> Result<(), LeafError> {
        let cmd = self
            .go_tool("compile", &input.dir)?
            .args(["-p", input.import_path.as_str()])
            .arg("-o")
            .arg(&input.output)
            .args(search_flags("-I", &input.include_dirs))
            .args(&input.gcflags)
            .args(&input.sources);
        self.run(cmd)
    }

    fn assemble(&self, input: &AssembleInput) -> Result<(), LeafError> {
        let cmd = self
            .go_tool("asm", &input.dir)?
            .args(search_flags("-I", &input.include_dirs))
            .arg("-o")
            .arg(&input.output)
            .arg(&input.source);
        self.run(cmd)
    }

    fn link(&self, input: &LinkInput) -> Result<(), LeafError> {
        if let Some(parent) = input.output.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LeafError::io("create directory", parent, e))?;
        }
        let cmd = self
            .go_tool("link", &input.dir)?
            .args(search_flags("-L", &input.lib_dirs))
            .args(&input.ldflags)
            .arg("-o")
            .arg(&input.output)
            .arg(&input.object);
        self.run(cmd)
    }

    fn archive(&self, input: &ArchiveInput) -> Result<(), LeafError> {
        if let Some(parent) = input.output.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LeafError::io("create directory", parent, e))?;
        }
        // `pack c` refuses to overwrite an existing archive.
        let _ = std::fs::remove_file(&input.output);
        let cmd = self
            .go_tool("pack", &input.dir)?
            .arg("c")
            .arg(&input.output)
            .args(&input.objects);
        self.run(cmd)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<(), LeafError> {
        tracing::debug!("copy {} -> {}", src.display(), dst.display());
        copy_file(src, dst).map_err(|e| LeafError::io("copy", src, e))
    }

    fn fetch_remote(&self, name: &str, update: bool) -> Result<(), LeafError> {
        let mut cmd = ProcessBuilder::new(self.go()?).arg("get");
        if update {
            cmd = cmd.arg("-u");
        }
        let cmd = cmd
            .arg(name)
            .env("GOOS", self.platform.os())
            .env("GOARCH", self.platform.arch());
        tracing::info!("{}", cmd.display_command());
        self.run(cmd)
    }

    fn run_build_script(&self, dir: &Path, goal: ScriptGoal) -> Result<(), LeafError> {
        let make = self
            .make
            .as_deref()
            .ok_or_else(|| LeafError::ToolNotFound("make".into()))?;
        let cmd = ProcessBuilder::new(make)
            .args(goal.args())
            .cwd(dir)
            .env("GOROOT", self.goroot.to_string_lossy())
            .env("GOOS", self.platform.os())
            .env("GOARCH", self.platform.arch());
        tracing::info!("{}", cmd.display_command());
        self.run(cmd)
    }

    fn build_interop(&self, input: &InteropInput) -> Result<(), LeafError> {
        interop::build(self, input)
    }

    fn run_test_binary(&self, dir: &Path, binary: &Path, args: &[String]) -> Result<(), LeafError> {
        let cmd = ProcessBuilder::new(binary).args(args).cwd(dir);
        tracing::debug!("{}", cmd.display_command());
        cmd.status_and_check()?;
        Ok(())
    }
}
