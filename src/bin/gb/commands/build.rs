//! `gb build` command

use anyhow::Result;

use super::Invocation;
use crate::cli::TargetArgs;

pub fn execute(args: TargetArgs, verbose: bool) -> Result<()> {
    Invocation::new(args, verbose)?.execute()?;
    Ok(())
}
