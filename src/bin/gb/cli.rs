//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// gb - A zero-configuration build orchestrator for Go source trees
#[derive(Parser)]
#[command(name = "gb")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Targets to build when no subcommand is given
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build stale targets (the default)
    Build(TargetArgs),

    /// Build, then install targets
    Install(TargetArgs),

    /// Remove build output
    Clean(CleanArgs),

    /// List the targets gb finds
    Scan(ScanArgs),

    /// Build, then run each target's tests
    Test(TestArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Output format for build messages.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum MessageFormatArg {
    #[default]
    Human,
    Json,
}

/// Target selection shared by every mode.
#[derive(Args, Clone, Default)]
pub struct TargetArgs {
    /// Directories to act on (defaults to the whole tree)
    pub dirs: Vec<PathBuf>,

    /// Only libraries
    #[arg(short = 'P', long)]
    pub packages_only: bool,

    /// Only commands
    #[arg(short = 'C', long)]
    pub commands_only: bool,

    /// Only act on the listed directories; their dependencies are left alone
    #[arg(short, long)]
    pub exclusive: bool,

    /// Also scan GOROOT/src and every GOPATH/src
    #[arg(short = 'R', long = "goroot")]
    pub toolchain_roots: bool,

    /// Build independent targets in parallel
    #[arg(short = 'p', long)]
    pub concurrent: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Fetch missing remote packages
    #[arg(short = 'g', long)]
    pub fetch: bool,

    /// Fetch and update every remote package
    #[arg(short = 'G', long)]
    pub update: bool,

    /// Prefer a directory's Makefile whenever one is present
    #[arg(long)]
    pub makefiles: bool,

    /// Record the working root in every scanned directory's gb.cfg
    #[arg(long)]
    pub workspace: bool,

    /// Print the scan listing before acting
    #[arg(short = 's', long)]
    pub scan: bool,

    /// Output format for build messages
    #[arg(long, value_enum, default_value_t)]
    pub message_format: MessageFormatArg,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Also remove installed artifacts
    #[arg(short = 'N', long)]
    pub nuke: bool,

    /// Do not ask before removing installed artifacts
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// List each target's imports
    #[arg(short = 'S', long, conflicts_with = "files")]
    pub deps: bool,

    /// List each target's files; dead files are marked with `*`
    #[arg(short = 'L', long)]
    pub files: bool,

    /// Read test files as well
    #[arg(short, long)]
    pub tests: bool,
}

#[derive(Args)]
pub struct TestArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Arguments passed to every test binary
    #[arg(long = "testargs", num_args = 1.., allow_hyphen_values = true, value_name = "ARGS")]
    pub test_args: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
