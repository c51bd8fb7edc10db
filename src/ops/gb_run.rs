//! Implementation of a gb run: scan, resolve, check, then act.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::builder::context::BuildOptions;
use crate::builder::events::BuildEvent;
use crate::builder::toolchain::Toolchain;
use crate::builder::BuildContext;
use crate::core::registry::{Registry, TargetId};
use crate::core::report::{Report, Summary};
use crate::core::scanner::Scanner;
use crate::core::target::{Provenance, ScanSettings, Target};
use crate::ops::scan::{print_listing, ScanDetail};
use crate::resolver::{find_any_cycle, resolve_all, ResolveError, ResolveOptions};
use crate::util::context::GlobalContext;
use crate::util::diagnostic::suggestions;
use crate::util::fs::{clean_path, is_inside, relative_path, remove_dir_all_if_exists, slash_path};

/// What a run does with the targets it selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Build,
    Install,
    Clean,
    Test,
    Scan,
}

impl Mode {
    fn builds(self) -> bool {
        matches!(self, Mode::Build | Mode::Install | Mode::Test)
    }
}

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Mode,

    /// Print a scan listing before acting (always printed in scan mode)
    pub listing: Option<ScanDetail>,

    /// Directories to act on, relative to the invocation directory
    pub dirs: Vec<PathBuf>,

    /// Only libraries take part
    pub pkgs_only: bool,

    /// Only commands take part
    pub cmds_only: bool,

    /// Also scan the toolchain tree and every external root
    pub toolchain_roots: bool,

    /// Record the working root in every scanned directory
    pub write_workspace: bool,

    /// Read test files while scanning outside of test mode
    pub scan_tests: bool,

    pub build: BuildOptions,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: Summary,

    /// Top-level targets that failed to build, install or test
    pub failures: usize,

    pub mode: Mode,
}

impl RunOutcome {
    /// Whether the process should exit successfully.
    pub fn success(&self) -> bool {
        self.mode == Mode::Scan || (self.failures == 0 && !self.summary.failed())
    }
}

/// Execute one gb run in `gctx`, performing leaf work through `toolchain`.
pub fn run(gctx: &GlobalContext, toolchain: &dyn Toolchain, opts: &RunOptions) -> Result<RunOutcome> {
    let started = Instant::now();
    let report = Report::new();

    let both = opts.pkgs_only == opts.cmds_only;
    let settings = ScanSettings {
        with_tests: opts.mode == Mode::Test || opts.scan_tests,
        do_pkgs: both || opts.pkgs_only,
        do_cmds: both || opts.cmds_only,
        write_workspace: opts.write_workspace,
    };

    let mut registry = Registry::new();
    let scanner = Scanner::new(gctx, &settings, &report);
    scanner.scan_root(&mut registry);
    if opts.toolchain_roots {
        tracing::info!("Scanning {}", gctx.env().stdlib_src().display());
        scanner.scan_toolchain_roots(&mut registry);
    }
    tracing::debug!("{} targets found", registry.len());

    let listed = select_listed(gctx, &registry, &opts.dirs, opts.build.exclusive)?;
    if listed.is_empty() {
        bail!(
            "No targets found in {}\n{}",
            gctx.cwd().display(),
            suggestions::NO_TARGETS
        );
    }

    let resolve_opts = ResolveOptions {
        allow_fetch: opts.build.allow_fetch,
        update: opts.build.update,
    };
    let unresolved = resolve_all(&mut registry, gctx, &resolve_opts, &report);

    if let Some(cycle) = find_any_cycle(&registry) {
        let err = ResolveError::CycleDetected {
            targets: registry.names(&cycle),
        };
        bail!("{}\n{}", err, suggestions::CYCLE);
    }

    let bctx = BuildContext::new(&registry, gctx, toolchain, opts.build.clone(), &report)
        .with_listed(listed.iter().copied());
    for id in registry.ids() {
        bctx.check_status(id);
    }

    if opts.mode == Mode::Scan || opts.listing.is_some() {
        let detail = opts.listing.unwrap_or_default();
        print_listing(&bctx, &listed, detail, settings.with_tests);
    }

    let mut failures = 0;
    let mut removed_roots = false;
    if opts.mode == Mode::Clean {
        if opts.dirs.is_empty() && gctx.oswd() == gctx.cwd() {
            removed_roots = remove_output_roots(&bctx)?;
        }
        bctx.clean_all(&listed);
    }
    if opts.mode.builds() {
        failures += bctx.build_all(&listed);
    }
    if opts.mode == Mode::Test {
        failures += bctx.test_all(&listed);
    }
    if opts.mode == Mode::Install {
        failures += bctx.install_all(&listed);
    }

    let summary = report.summary();
    if opts.mode.builds() {
        if !opts.build.message_format.is_json() {
            for err in &unresolved {
                eprint!("{}", err.to_diagnostic());
            }
        }
        print_summary(&bctx, &summary);
    }
    if opts.mode == Mode::Clean && summary.cleaned == 0 && !removed_roots {
        bctx.status("No mess to clean");
    }

    let outcome = RunOutcome {
        summary,
        failures,
        mode: opts.mode,
    };
    if opts.mode.builds() {
        bctx.emit(BuildEvent::finished(
            outcome.success(),
            started.elapsed().as_millis() as u64,
            outcome.summary.built,
            outcome.summary.installed,
            outcome.summary.broken,
        ));
    }
    Ok(outcome)
}

/// Top-level targets for this run.
///
/// Listed directories select the targets in them and, unless `exclusive`,
/// below them. With nothing listed, a run started below the working root
/// lists its own directory. A listed directory holding no target is an
/// error.
fn select_listed(
    gctx: &GlobalContext,
    registry: &Registry,
    dirs: &[PathBuf],
    exclusive: bool,
) -> Result<Vec<TargetId>> {
    let mut listed: Vec<PathBuf> = dirs
        .iter()
        .map(|d| clean_path(&gctx.oswd().join(d)))
        .collect();
    if listed.is_empty() && gctx.oswd() != gctx.cwd() && is_inside(gctx.oswd(), gctx.cwd()) {
        listed.push(gctx.oswd().to_path_buf());
    }

    let mut validated: HashSet<&PathBuf> = HashSet::new();
    let mut roots = Vec::new();
    for (id, target) in registry.iter() {
        if !acted_upon(gctx, target) {
            continue;
        }
        if listed.is_empty() {
            roots.push(id);
            continue;
        }
        let mut hit = false;
        for dir in &listed {
            let matches = if exclusive {
                target.abs_dir == *dir
            } else {
                is_inside(&target.abs_dir, dir)
            };
            if matches {
                validated.insert(dir);
                hit = true;
            }
        }
        if hit {
            roots.push(id);
        }
    }

    for dir in &listed {
        if !validated.contains(dir) {
            let rel = slash_path(&relative_path(gctx.cwd(), dir));
            bail!(
                "Listed directory \"{}\" doesn't correspond to a known target\n{}",
                if rel.is_empty() { "." } else { rel.as_str() },
                suggestions::UNKNOWN_DIRECTORY
            );
        }
    }
    Ok(roots)
}

/// Toolchain and external-root targets are only acted upon from inside
/// their own tree.
fn acted_upon(gctx: &GlobalContext, target: &Target) -> bool {
    match &target.provenance {
        Provenance::Stdlib => gctx.running_in_goroot(),
        Provenance::External(_) => gctx.running_in_gopath().is_some(),
        Provenance::Local => true,
    }
}

fn remove_output_roots(bctx: &BuildContext<'_>) -> Result<bool> {
    let mut removed = false;
    for root in [bctx.gctx.build_dir_pkg(), bctx.gctx.build_dir_cmd()] {
        if root.is_dir() {
            bctx.status(format!("Removing {}", root.display()));
            remove_dir_all_if_exists(&root)?;
            removed = true;
        }
    }
    Ok(removed)
}

fn print_summary(bctx: &BuildContext<'_>, summary: &Summary) {
    match summary.built {
        0 => {}
        1 => bctx.status("Built 1 target"),
        n => bctx.status(format!("Built {} targets", n)),
    }
    match summary.installed {
        0 => {}
        1 => bctx.status("Installed 1 target"),
        n => bctx.status(format!("Installed {} targets", n)),
    }
    if summary.built == 0 && summary.installed == 0 && !summary.failed() {
        bctx.status("Up to date");
    }
    match summary.broken {
        0 => {}
        1 => bctx.status("1 broken target"),
        n => bctx.status(format!("{} broken targets", n)),
    }
    if summary.tests_failed > 0 {
        bctx.status(format!("{} failed test runs", summary.tests_failed));
    }
    for entry in &summary.messages {
        bctx.status(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn greet_project(fx: &Fixture) {
        fx.file("cmd/greet/main.go", "package main\n\nimport \"lib/util\"\n");
        fx.file("lib/util/util.go", "package util\n");
    }

    #[test]
    fn test_build_then_up_to_date() {
        let fx = Fixture::new();
        greet_project(&fx);
        let ctx = fx.ctx();
        let tc = fx.toolchain();

        let outcome = run(&ctx, &tc, &RunOptions::default()).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.summary.built, 2);

        let tc = fx.toolchain();
        let outcome = run(&ctx, &tc, &RunOptions::default()).unwrap();
        assert_eq!(outcome.summary.built, 0);
        assert!(tc.calls().is_empty());
    }

    #[test]
    fn test_install_mode_copies_artifacts() {
        let fx = Fixture::new();
        greet_project(&fx);
        let tc = fx.toolchain();
        let opts = RunOptions {
            mode: Mode::Install,
            ..RunOptions::default()
        };

        let outcome = run(&fx.ctx(), &tc, &opts).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.summary.installed, 2);
        assert!(fx.goroot().join("bin/greet").is_file());
    }

    #[test]
    fn test_no_targets() {
        let fx = Fixture::new();
        fx.file("README", "nothing here\n");
        let err = run(&fx.ctx(), &fx.toolchain(), &RunOptions::default()).unwrap_err();
        assert!(err.to_string().contains("No targets found"));
    }

    #[test]
    fn test_cycle_aborts_before_building() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"b\"\n");
        fx.file("b/b.go", "package b\n\nimport \"a\"\n");
        let tc = fx.toolchain();

        let err = run(&fx.ctx(), &tc, &RunOptions::default()).unwrap_err();
        assert!(err.to_string().contains("import cycle"));
        assert!(tc.calls().is_empty());
    }

    #[test]
    fn test_unknown_listed_dir() {
        let fx = Fixture::new();
        greet_project(&fx);
        fx.file("docs/notes.txt", "");
        let opts = RunOptions {
            dirs: vec![PathBuf::from("docs")],
            ..RunOptions::default()
        };

        let err = run(&fx.ctx(), &fx.toolchain(), &opts).unwrap_err();
        assert!(err.to_string().contains("\"docs\" doesn't correspond"));
    }

    #[test]
    fn test_listed_dir_scopes_roots() {
        let fx = Fixture::new();
        greet_project(&fx);
        fx.file("other/o.go", "package other\n");
        let tc = fx.toolchain();
        let opts = RunOptions {
            dirs: vec![PathBuf::from("cmd")],
            ..RunOptions::default()
        };

        let outcome = run(&fx.ctx(), &tc, &opts).unwrap();
        assert_eq!(outcome.summary.built, 2);
        assert!(!tc.leaf_dirs("archive").contains(&"other".to_string()));
    }

    #[test]
    fn test_run_from_subdirectory_lists_it() {
        let fx = Fixture::new();
        greet_project(&fx);
        fx.file("lib/gb.cfg", "workspace=..\n");
        let tc = fx.toolchain();

        let outcome = run(&fx.ctx_in("lib"), &tc, &RunOptions::default()).unwrap();
        assert_eq!(outcome.summary.built, 1);
        assert!(tc.leaf_dirs("link").is_empty());
    }

    #[test]
    fn test_commands_only() {
        let fx = Fixture::new();
        greet_project(&fx);
        let tc = fx.toolchain();
        let opts = RunOptions {
            cmds_only: true,
            ..RunOptions::default()
        };

        let outcome = run(&fx.ctx(), &tc, &opts).unwrap();
        assert!(tc.leaf_dirs("archive").is_empty());
        assert_eq!(outcome.summary.built, 1);
    }

    #[test]
    fn test_clean_without_mess() {
        let fx = Fixture::new();
        greet_project(&fx);
        let opts = RunOptions {
            mode: Mode::Clean,
            ..RunOptions::default()
        };

        let outcome = run(&fx.ctx(), &fx.toolchain(), &opts).unwrap();
        assert_eq!(outcome.summary.cleaned, 0);
        assert!(outcome.success());
    }

    #[test]
    fn test_failure_sets_exit_status() {
        let fx = Fixture::new();
        greet_project(&fx);
        let tc = fx.toolchain().fail_in("lib/util");

        let outcome = run(&fx.ctx(), &tc, &RunOptions::default()).unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.summary.broken, 2);
    }
}
