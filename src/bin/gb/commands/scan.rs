//! `gb scan` command
//!
//! Lists targets in dependency order without building anything.

use anyhow::Result;

use super::Invocation;
use crate::cli::ScanArgs;
use gb::ops::{Mode, ScanDetail};

pub fn execute(args: ScanArgs, verbose: bool) -> Result<()> {
    let mut inv = Invocation::new(args.target, verbose)?;
    inv.opts.mode = Mode::Scan;
    inv.opts.listing = Some(if args.files {
        ScanDetail::Sources
    } else if args.deps {
        ScanDetail::Deps
    } else {
        ScanDetail::Plain
    });
    inv.opts.scan_tests = args.tests;
    inv.execute()?;
    Ok(())
}
