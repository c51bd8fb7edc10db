//! Scan listings: what gb found, in dependency order.

use std::collections::HashSet;

use crate::builder::BuildContext;
use crate::core::registry::TargetId;
use crate::core::target::{build_script, Provenance, Target};
use crate::resolver::DepGraph;

/// How much to print per target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanDetail {
    /// One line per target
    #[default]
    Plain,
    /// Also the target's imports
    Deps,
    /// Also the target's files, dead ones marked with `*`
    Sources,
}

/// Lines describing `roots` and everything they depend on, dependencies
/// first. Targets filtered out by the library/command switches are left
/// out.
pub fn listing(
    bctx: &BuildContext<'_>,
    roots: &[TargetId],
    detail: ScanDetail,
    with_tests: bool,
) -> Vec<String> {
    let graph = DepGraph::from_registry(bctx.registry);
    let order = graph.build_order(roots).unwrap_or_else(|| roots.to_vec());

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for id in order {
        let target = bctx.target(id);
        if !target.active || !seen.insert(id) {
            continue;
        }
        lines.push(summary_line(bctx, target, id));
        match detail {
            ScanDetail::Plain => {}
            ScanDetail::Deps => {
                lines.push(format!(" {} Deps: {}", target.package, bracketed(&target.imports)));
                if with_tests {
                    lines.push(format!(
                        " {} TestDeps: {}",
                        target.package,
                        bracketed(&target.test_imports)
                    ));
                }
            }
            ScanDetail::Sources => lines.extend(source_lines(target)),
        }
    }
    lines
}

pub fn print_listing(bctx: &BuildContext<'_>, roots: &[TargetId], detail: ScanDetail, with_tests: bool) {
    for line in listing(bctx, roots, detail, with_tests) {
        println!("{}", line);
    }
}

fn summary_line(bctx: &BuildContext<'_>, target: &Target, id: TargetId) -> String {
    let (needs_build, needs_install) = bctx.check_status(id);
    let status = if !needs_install {
        " (installed)"
    } else if !needs_build {
        " (up to date)"
    } else {
        ""
    };

    let dir = target.dir.display().to_string();
    let suffix = if target.provenance == Provenance::Local && dir != target.name {
        format!(" in {}", dir)
    } else {
        String::new()
    };
    format!("{} \"{}\"{}{}", target.label(), target.name, suffix, status)
}

fn bracketed<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.into_iter().map(String::as_str).collect();
    format!("[{}]", items.join(" "))
}

fn source_lines(target: &Target) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(script) = build_script(&target.abs_dir) {
        lines.push(format!("\t{}", script));
    }
    if target.abs_dir.join("README").is_file() {
        lines.push("\tREADME".to_string());
    }

    let mut go: Vec<&String> = target.interop_sources().iter().chain(target.go_sources()).collect();
    go.sort();
    let mut asm: Vec<&String> = target.sources.asm.iter().collect();
    asm.sort();
    let mut c: Vec<&String> = target.sources.c.iter().collect();
    c.sort();
    for file in go.into_iter().chain(asm).chain(c) {
        lines.push(format!("\t{}", file));
    }
    for file in &target.sources.dead {
        lines.push(format!("\t*{}", file));
    }
    lines
}
