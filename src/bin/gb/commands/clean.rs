//! `gb clean` command

use anyhow::Result;

use super::Invocation;
use crate::cli::CleanArgs;
use gb::ops::Mode;

pub fn execute(args: CleanArgs, verbose: bool) -> Result<()> {
    let mut inv = Invocation::new(args.target, verbose)?;
    inv.opts.mode = Mode::Clean;
    inv.opts.build.nuke = args.nuke;
    inv.opts.build.force = args.force;
    inv.execute()?;
    Ok(())
}
