//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod install;
pub mod scan;

use anyhow::{bail, Result};

use crate::cli::{MessageFormatArg, TargetArgs};
use gb::builder::{BuildOptions, GoToolchain, MessageFormat};
use gb::ops::{run, RunOptions, RunOutcome};
use gb::util::config::load_config;
use gb::util::GlobalContext;

/// Run options from the shared target flags, with the tool config filling
/// in what the command line leaves unset.
pub(crate) struct Invocation {
    pub ctx: GlobalContext,
    pub toolchain: GoToolchain,
    pub opts: RunOptions,
}

impl Invocation {
    pub fn new(args: TargetArgs, verbose: bool) -> Result<Self> {
        let mut ctx = GlobalContext::new()?;
        let config = load_config(&ctx.config_path(), &ctx.project_config_path());
        ctx.env_mut()
            .add_flags(&config.build.gcflags, &config.build.ldflags);

        let toolchain = GoToolchain::detect(&config.toolchain, ctx.platform(), ctx.env().goroot());

        let build = BuildOptions {
            concurrent: args.concurrent || config.build.concurrent,
            jobs: args.jobs.or(config.build.jobs),
            exclusive: args.exclusive,
            allow_fetch: args.fetch || args.update || config.net.allow_fetch,
            update: args.update,
            use_build_scripts: args.makefiles || config.build.use_build_scripts,
            verbose,
            message_format: match args.message_format {
                MessageFormatArg::Human => MessageFormat::Human,
                MessageFormatArg::Json => MessageFormat::Json,
            },
            ..BuildOptions::default()
        };

        let opts = RunOptions {
            listing: args.scan.then(Default::default),
            dirs: args.dirs,
            pkgs_only: args.packages_only,
            cmds_only: args.commands_only,
            toolchain_roots: args.toolchain_roots,
            write_workspace: args.workspace,
            build,
            ..RunOptions::default()
        };

        Ok(Invocation {
            ctx,
            toolchain,
            opts,
        })
    }

    /// Perform the run; any failed target fails the process.
    pub fn execute(self) -> Result<RunOutcome> {
        let outcome = run(&self.ctx, &self.toolchain, &self.opts)?;
        if !outcome.success() {
            let failed = outcome.failures.max(outcome.summary.broken + outcome.summary.unresolved);
            bail!("{} target(s) failed", failed);
        }
        Ok(outcome)
    }
}
