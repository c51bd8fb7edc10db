//! `gb install` command

use anyhow::Result;

use super::Invocation;
use crate::cli::TargetArgs;
use gb::ops::Mode;

pub fn execute(args: TargetArgs, verbose: bool) -> Result<()> {
    let mut inv = Invocation::new(args, verbose)?;
    inv.opts.mode = Mode::Install;
    inv.execute()?;
    Ok(())
}
