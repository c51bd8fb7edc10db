//! gb CLI - A zero-configuration build orchestrator for Go source trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("gb=debug")
    } else {
        EnvFilter::new("gb=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        None => commands::build::execute(cli.target, cli.verbose),
        Some(Commands::Build(args)) => commands::build::execute(args, cli.verbose),
        Some(Commands::Install(args)) => commands::install::execute(args, cli.verbose),
        Some(Commands::Clean(args)) => commands::clean::execute(args, cli.verbose),
        Some(Commands::Scan(args)) => commands::scan::execute(args, cli.verbose),
        Some(Commands::Test(args)) => commands::test::execute(args, cli.verbose),
        Some(Commands::Completions(args)) => commands::completions::execute(args),
    }
}
