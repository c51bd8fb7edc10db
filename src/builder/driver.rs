//! Staleness propagation and the build, install, clean and test passes.
//!
//! Every pass recurses depth-first over resolved dependencies, so a
//! target's own leaf work never starts before its dependencies finished
//! theirs. Each target's mutex is held for the whole of its own pass and
//! only briefly taken on dependencies, which keeps the lock order aligned
//! with the (acyclic) dependency graph. Only top-level targets are spread
//! across worker threads; dependency recursion stays on the calling
//! thread.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

use crate::builder::context::BuildContext;
use crate::builder::events::BuildEvent;
use crate::builder::interop::{InteropInput, WORK_DIR};
use crate::builder::testmain::{self, TEST_DIR};
use crate::builder::toolchain::{
    ArchiveInput, AssembleInput, CompileInput, LeafError, LinkInput, ScriptGoal,
};
use crate::core::registry::TargetId;
use crate::core::target::{Target, TargetState};
use crate::util::fs::{base_name, remove_dir_all_if_exists, remove_file_if_exists, Mtime};

/// Object the package's Go sources compile into.
const GO_OBJECT: &str = "_go_.o";

/// Why a target did not make it through a pass.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cannot build deps")]
    DepsFailed,

    #[error("Cannot install deps")]
    InstallDepsFailed,

    #[error("failed earlier in this run")]
    AlreadyFailed,

    #[error("unresolved imports: {}", .0.join(", "))]
    Unresolved(Vec<String>),

    #[error("could not fetch \"{name}\": {source}")]
    FetchFailed {
        name: String,
        #[source]
        source: LeafError,
    },

    #[error("build failed: {0}")]
    LeafBuildFailed(#[source] LeafError),

    #[error("install failed: {0}")]
    LeafInstallFailed(#[source] LeafError),

    #[error("can't install testdata target")]
    TestdataInstall,

    #[error("tests failed: {0}")]
    TestFailed(#[source] LeafError),
}

impl BuildContext<'_> {
    /// Compute whether `id` needs building and installing. Idempotent.
    ///
    /// Must only run after cycle detection passed.
    pub fn check_status(&self, id: TargetId) -> (bool, bool) {
        self.touched(id);
        let state = self.target(id).lock();
        (state.needs_build, state.needs_install)
    }

    /// Inbound freshness of `id`, recomputing its status on first use.
    pub fn touched(&self, id: TargetId) -> Mtime {
        let target = self.target(id);
        {
            let state = target.lock();
            if state.checked {
                return state.inbound_time;
            }
        }

        let mut inbound = target.source_time.max(target.external_time);
        let mut deps_stale = false;
        for &dep in &target.deps {
            self.touched(dep);
            let dep_state = self.target(dep).lock();
            inbound = inbound.max(dep_state.artifact_time);
            deps_stale |= dep_state.needs_build;
        }

        let mut state = target.lock();
        state.checked = true;
        state.inbound_time = inbound;
        state.needs_build |= inbound > state.artifact_time || deps_stale;
        state.needs_install = state.needs_build
            || state.installed_time < state.artifact_time
            || state.installed_time < inbound;
        inbound
    }

    /// Build `id` after its dependencies. Each target is attempted at most
    /// once per run.
    pub fn build(&self, id: TargetId) -> Result<(), BuildError> {
        let target = self.target(id);
        let mut state = target.lock();

        if state.failed {
            return Err(BuildError::AlreadyFailed);
        }
        if !state.needs_build || state.built {
            return Ok(());
        }
        state.built = true;

        if !self.in_scope(id) {
            return Ok(());
        }

        let mut inbound = target.source_time.max(target.external_time);
        let mut deps_ok = true;
        for &dep in &target.deps {
            match self.build(dep) {
                Ok(()) => inbound = inbound.max(self.target(dep).lock().artifact_time),
                Err(_) => deps_ok = false,
            }
        }
        if !deps_ok {
            return Err(self.fail(target, &mut state, BuildError::DepsFailed));
        }

        if self.options.allow_fetch || self.options.update {
            let remote = if self.options.update {
                &target.remote_imports
            } else {
                &target.missing_remote
            };
            for name in remote {
                match self.fetch_once(name) {
                    Ok(time) => inbound = inbound.max(time),
                    Err(source) => {
                        let err = BuildError::FetchFailed {
                            name: name.clone(),
                            source,
                        };
                        return Err(self.fail(target, &mut state, err));
                    }
                }
            }
        }

        if !target.active {
            return Ok(());
        }
        if !target.unresolved.is_empty() {
            let err = BuildError::Unresolved(target.unresolved.clone());
            return Err(self.fail(target, &mut state, err));
        }

        if inbound > state.artifact_time {
            self.status(format!(
                "(in {}) building {} \"{}\"",
                self.display_dir(target),
                target.kind.describe(),
                target.name
            ));
            if let Err(e) = self.build_leaf(target) {
                if !target.provenance.installs_in_place() {
                    let _ = remove_file_if_exists(&target.result_path);
                }
                target.refresh_times(&mut state);
                return Err(self.fail(target, &mut state, BuildError::LeafBuildFailed(e)));
            }
            self.report.record_built();
            self.emit(BuildEvent::built(
                &target.name,
                target.kind.describe(),
                &target.dir,
                &target.result_path,
            ));
        }

        state.needs_build = false;
        target.refresh_times(&mut state);
        state.needs_install = state.installed_time < state.artifact_time;
        Ok(())
    }

    /// Build each of `roots`, in parallel when configured. Returns the
    /// number of roots that failed; a failure never stops the others.
    pub fn build_all(&self, roots: &[TargetId]) -> usize {
        let progress = self.progress(roots.len());
        let run = |id: TargetId| {
            if let Some(pb) = &progress {
                pb.set_message(self.target(id).name.clone());
            }
            let failed = self.build(id).is_err();
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            failed
        };

        let failures = if self.options.concurrent {
            let threads = self.options.jobs.unwrap_or(0);
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| roots.par_iter().filter(|id| run(**id)).count()),
                Err(e) => {
                    tracing::warn!("could not start worker threads: {}", e);
                    roots.iter().filter(|id| run(**id)).count()
                }
            }
        } else {
            roots.iter().filter(|id| run(**id)).count()
        };

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        failures
    }

    /// Install `id` after its dependencies. Artifacts that are produced at
    /// their install location are left alone.
    pub fn install(&self, id: TargetId) -> Result<(), BuildError> {
        let target = self.target(id);
        let mut state = target.lock();

        if state.failed {
            return Err(BuildError::AlreadyFailed);
        }
        if !state.needs_install || state.installed {
            return Ok(());
        }
        state.installed = true;

        if !self.in_scope(id) {
            return Ok(());
        }

        let mut deps_ok = true;
        for &dep in &target.deps {
            deps_ok &= self.install(dep).is_ok();
        }
        if !deps_ok {
            return Err(self.fail(target, &mut state, BuildError::InstallDepsFailed));
        }

        if !target.active {
            return Ok(());
        }
        if target.testdata_root.is_some() {
            return Err(self.fail(target, &mut state, BuildError::TestdataInstall));
        }
        if state.needs_build || state.artifact_time.is_none() {
            return Ok(());
        }

        if !target.provenance.installs_in_place() && state.installed_time < state.artifact_time {
            self.status(format!(
                "Installing {} \"{}\"",
                target.kind.describe(),
                target.name
            ));
            if let Err(e) = self.toolchain.copy(&target.result_path, &target.install_path) {
                return Err(self.fail(target, &mut state, BuildError::LeafInstallFailed(e)));
            }
            self.report.record_installed();
            self.emit(BuildEvent::installed(
                &target.name,
                &target.dir,
                &target.install_path,
            ));
        }

        state.needs_install = false;
        target.refresh_times(&mut state);
        Ok(())
    }

    pub fn install_all(&self, roots: &[TargetId]) -> usize {
        roots.iter().filter(|&&id| self.install(id).is_err()).count()
    }

    /// Remove what building `id` and its dependencies left behind.
    pub fn clean(&self, id: TargetId) {
        let target = self.target(id);
        let mut state = target.lock();
        if state.cleaned {
            return;
        }
        state.cleaned = true;
        if !self.in_scope(id) {
            return;
        }

        for &dep in &target.deps {
            self.clean(dep);
        }
        if !target.active {
            return;
        }

        if let Err(e) = self.clean_files(target) {
            tracing::warn!("(in {}) {:#}", target.dir.display(), e);
        }
        target.refresh_times(&mut state);
        state.needs_build = true;
        state.needs_install = true;
    }

    pub fn clean_all(&self, roots: &[TargetId]) {
        for &id in roots {
            self.clean(id);
        }
    }

    /// Build and run the tests of `id`.
    pub fn test(&self, id: TargetId) -> Result<(), BuildError> {
        let target = self.target(id);
        if !target.active || !self.in_scope(id) || !target.has_tests() {
            return Ok(());
        }

        let mut deps_ok = true;
        for &dep in &target.test_deps {
            deps_ok &= self.build(dep).is_ok();
        }
        let mut state = target.lock();
        if state.tested {
            return Ok(());
        }
        state.tested = true;
        if state.failed {
            return Err(BuildError::AlreadyFailed);
        }
        if !deps_ok {
            return Err(self.fail(target, &mut state, BuildError::DepsFailed));
        }

        if self.uses_build_script(target) || target.interop {
            self.status(format!("(in {})", self.display_dir(target)));
            return self
                .toolchain
                .run_build_script(&target.abs_dir, ScriptGoal::Test)
                .map_err(|e| self.test_failed(target, e));
        }

        self.status(format!(
            "(in {}) testing \"{}\"",
            self.display_dir(target),
            target.name
        ));
        let test_dir = target.abs_dir.join(TEST_DIR);
        let result = self.run_tests(target, &test_dir);
        if let Err(e) = remove_dir_all_if_exists(&test_dir) {
            tracing::warn!("{:#}", e);
        }
        result.map_err(|e| self.test_failed(target, e))
    }

    pub fn test_all(&self, roots: &[TargetId]) -> usize {
        roots.iter().filter(|&&id| self.test(id).is_err()).count()
    }

    fn test_failed(&self, target: &Target, e: LeafError) -> BuildError {
        tracing::warn!("(in {}) {}", target.dir.display(), e);
        self.report
            .record_test_failure(&target.dir, format!("tests failed for \"{}\"", target.name));
        self.emit(BuildEvent::failed(&target.name, &target.dir, e.to_string()));
        BuildError::TestFailed(e)
    }

    /// Record a failure of `target` and mark it failed for the rest of
    /// the run.
    fn fail(&self, target: &Target, state: &mut TargetState, err: BuildError) -> BuildError {
        state.failed = true;
        let message = match &err {
            BuildError::DepsFailed | BuildError::InstallDepsFailed => {
                format!("could not build \"{}\": {}", target.name, err)
            }
            BuildError::TestdataInstall => format!("can't install testdata target \"{}\"", target.name),
            BuildError::LeafInstallFailed(_) => format!("could not install \"{}\"", target.name),
            _ => format!("could not build \"{}\"", target.name),
        };
        tracing::warn!("(in {}) {}", target.dir.display(), err);
        self.report.record_broken(&target.dir, message.clone());
        self.emit(BuildEvent::failed(&target.name, &target.dir, message));
        err
    }

    fn uses_build_script(&self, target: &Target) -> bool {
        target.has_build_script && (target.must_use_build_script || self.options.use_build_scripts)
    }

    /// Directory for status lines; the toolchain tree is abbreviated.
    fn display_dir(&self, target: &Target) -> String {
        let goroot = self.gctx.env().goroot();
        match target.abs_dir.strip_prefix(goroot) {
            Ok(rest) if target.dir.is_absolute() => format!("$GOROOT/{}", rest.display()),
            _ => target.dir.display().to_string(),
        }
    }

    fn gcflags(&self, target: &Target) -> Vec<String> {
        let mut flags = self.gctx.env().gcflags().to_vec();
        flags.extend(target.gcflags.iter().cloned());
        flags
    }

    fn build_leaf(&self, target: &Target) -> Result<(), LeafError> {
        let tc = self.toolchain;
        if target.must_use_build_script || self.uses_build_script(target) {
            let goal = if target.provenance.installs_in_place() {
                ScriptGoal::Install
            } else if target.is_command() {
                ScriptGoal::Command
            } else {
                ScriptGoal::Package
            };
            return tc.run_build_script(&target.abs_dir, goal);
        }

        let search = self.search_dirs(target);
        if target.interop {
            return tc.build_interop(&InteropInput {
                dir: target.abs_dir.clone(),
                import_path: target.name.clone(),
                package: target.package.clone(),
                go_sources: target.go_sources().to_vec(),
                interop_sources: target.interop_sources().to_vec(),
                c_sources: target.sources.c.clone(),
                cflags: target.cflags.clone(),
                ldflags: target.ldflags.clone(),
                include_dirs: search,
                gcflags: self.gcflags(target),
                output: target.result_path.clone(),
            });
        }

        let go_object = target.abs_dir.join(GO_OBJECT);
        let asm_objects: Vec<PathBuf> = target
            .sources
            .asm
            .iter()
            .map(|s| target.abs_dir.join(object_name(s)))
            .collect();

        let result = self.compile_and_pack(target, &go_object, &asm_objects, search);
        for object in std::iter::once(&go_object).chain(&asm_objects) {
            tracing::debug!("Removing {}", object.display());
            let _ = remove_file_if_exists(object);
        }
        result
    }

    fn compile_and_pack(
        &self,
        target: &Target,
        go_object: &Path,
        asm_objects: &[PathBuf],
        search: Vec<PathBuf>,
    ) -> Result<(), LeafError> {
        let tc = self.toolchain;
        let import_path = if target.is_command() {
            "main".to_string()
        } else {
            target.name.clone()
        };
        tc.compile(&CompileInput {
            dir: target.abs_dir.clone(),
            import_path,
            sources: target.go_sources().iter().map(PathBuf::from).collect(),
            output: go_object.to_path_buf(),
            include_dirs: search.clone(),
            gcflags: self.gcflags(target),
        })?;

        for (src, object) in target.sources.asm.iter().zip(asm_objects) {
            tc.assemble(&AssembleInput {
                dir: target.abs_dir.clone(),
                source: PathBuf::from(src),
                output: object.clone(),
                include_dirs: vec![self.gctx.env().goroot().join("pkg").join("include")],
            })?;
        }

        if target.is_command() {
            tc.link(&LinkInput {
                dir: target.abs_dir.clone(),
                object: go_object.to_path_buf(),
                output: target.result_path.clone(),
                lib_dirs: search,
                ldflags: self.gctx.env().ldflags().to_vec(),
            })
        } else {
            let mut objects = vec![go_object.to_path_buf()];
            objects.extend(asm_objects.iter().cloned());
            tc.archive(&ArchiveInput {
                dir: target.abs_dir.clone(),
                objects,
                output: target.result_path.clone(),
            })
        }
    }

    fn run_tests(&self, target: &Target, test_dir: &Path) -> Result<(), LeafError> {
        let tc = self.toolchain;
        let obj_dir = test_dir.join("_obj");
        std::fs::create_dir_all(&obj_dir)
            .map_err(|e| LeafError::io("create directory", &obj_dir, e))?;

        let packages = testmain::test_packages(target);
        let main_src = test_dir.join("_testmain.go");
        std::fs::write(&main_src, testmain::render(&packages))
            .map_err(|e| LeafError::io("write", &main_src, e))?;

        let mut search = vec![obj_dir.clone()];
        search.extend(self.search_dirs(target));
        let gcflags = self.gcflags(target);
        let test_object = test_dir.join("_gotest_.o");

        // The package under test is rebuilt with its internal tests first,
        // then every external test package against it.
        let mut order: Vec<&String> = target.sources.tests.keys().collect();
        order.sort_by_key(|p| **p != target.package);
        if !order.contains(&&target.package) {
            order.insert(0, &target.package);
        }
        for package in order {
            let mut sources: Vec<PathBuf> = Vec::new();
            if *package == target.package {
                sources.extend(target.go_sources().iter().map(PathBuf::from));
            }
            if let Some(files) = target.sources.tests.get(package) {
                sources.extend(files.iter().map(PathBuf::from));
            }
            let import_path = testmain::test_import_path(target, package);
            tc.compile(&CompileInput {
                dir: target.abs_dir.clone(),
                import_path: import_path.clone(),
                sources,
                output: test_object.clone(),
                include_dirs: search.clone(),
                gcflags: gcflags.clone(),
            })?;
            tc.archive(&ArchiveInput {
                dir: target.abs_dir.clone(),
                objects: vec![test_object.clone()],
                output: obj_dir.join(format!("{import_path}.a")),
            })?;
        }

        let main_object = test_dir.join("_testmain.o");
        tc.compile(&CompileInput {
            dir: target.abs_dir.clone(),
            import_path: "main".into(),
            sources: vec![main_src],
            output: main_object.clone(),
            include_dirs: search.clone(),
            gcflags,
        })?;

        let binary = test_dir.join(format!(
            "_testmain{}",
            self.gctx.platform().exe_suffix()
        ));
        tc.link(&LinkInput {
            dir: target.abs_dir.clone(),
            object: main_object,
            output: binary.clone(),
            lib_dirs: search,
            ldflags: self.gctx.env().ldflags().to_vec(),
        })?;

        tc.run_test_binary(&target.abs_dir, &binary, &self.options.test_args)
    }

    fn clean_files(&self, target: &Target) -> anyhow::Result<()> {
        if self.uses_build_script(target) {
            self.status(format!("(in {})", self.display_dir(target)));
            self.toolchain
                .run_build_script(&target.abs_dir, ScriptGoal::Clean { nuke: self.options.nuke })?;
            self.report.record_cleaned();
            return Ok(());
        }

        if self.options.nuke
            && target.install_path != target.result_path
            && target.install_path.exists()
            && (self.options.force || confirm_nuke(&target.install_path))
        {
            tracing::debug!("Removing {}", target.install_path.display());
            remove_file_if_exists(&target.install_path)?;
        }

        let mut files: Vec<PathBuf> = vec![target.abs_dir.join(GO_OBJECT), target.result_path.clone()];
        files.extend(target.sources.asm.iter().map(|s| target.abs_dir.join(object_name(s))));
        if target.is_command() {
            let local = target.abs_dir.join(base_name(&target.result_path));
            if local != target.result_path {
                files.push(local);
            }
        }
        let dirs = [target.abs_dir.join(TEST_DIR), target.abs_dir.join(WORK_DIR)];

        if !files.iter().any(|f| f.exists()) && !dirs.iter().any(|d| d.exists()) {
            return Ok(());
        }

        self.status(format!("Cleaning {}", self.display_dir(target)));
        self.report.record_cleaned();
        for file in &files {
            if remove_file_if_exists(file)? {
                tracing::debug!("Removing {}", file.display());
            }
        }
        for dir in &dirs {
            remove_dir_all_if_exists(dir)?;
        }
        Ok(())
    }

    fn progress(&self, total: usize) -> Option<ProgressBar> {
        if self.options.verbose || total < 2 || self.options.message_format.is_json() {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{pos}/{len}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn object_name(asm: &str) -> String {
    let stem = asm.strip_suffix(".s").unwrap_or(asm);
    format!("{stem}.o")
}

fn confirm_nuke(path: &Path) -> bool {
    print!("Really nuke installed artifact '{}'? (y/n) ", path.display());
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::BuildOptions;
    use crate::core::registry::Registry;
    use crate::core::report::Report;
    use crate::core::TargetKind;
    use crate::resolver::resolve_all;
    use crate::test_support::Fixture;

    fn resolved(fx: &Fixture) -> Registry {
        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &Default::default(), &Report::new());
        assert!(errors.is_empty(), "{errors:?}");
        registry
    }

    fn check_all(bctx: &BuildContext<'_>) {
        for id in bctx.registry.ids() {
            bctx.check_status(id);
        }
    }

    fn greet_project(fx: &Fixture) {
        fx.file("cmd/greet/main.go", "package main\n\nimport (\n\t\"fmt\"\n\t\"lib/util\"\n)\n");
        fx.file("lib/util/util.go", "package util\n");
    }

    #[test]
    fn test_round_trip_and_idempotence() {
        let fx = Fixture::new();
        greet_project(&fx);
        let ctx = fx.ctx();
        let registry = resolved(&fx);
        let greet = registry.lookup("greet", TargetKind::Command).unwrap();
        assert_eq!(registry.names(&registry.get(greet).deps), vec!["lib/util"]);

        let tc = fx.toolchain();
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        check_all(&bctx);
        assert_eq!(bctx.build_all(&[greet]), 0);

        assert_eq!(tc.leaf_dirs("archive"), vec!["lib/util"]);
        assert_eq!(tc.leaf_dirs("link"), vec!["cmd/greet"]);
        assert_eq!(report.summary().built, 2);
        assert!(fx.root().join("_obj/lib/util.a").is_file());
        assert!(fx.root().join("bin/greet").is_file());

        // A fresh run over the same tree has nothing to do.
        let registry = resolved(&fx);
        let tc = fx.toolchain();
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        check_all(&bctx);
        for id in registry.ids() {
            assert_eq!(bctx.check_status(id).0, false);
        }
        assert_eq!(bctx.build_all(&[greet]), 0);
        assert!(tc.calls().is_empty());
        assert_eq!(report.summary().built, 0);
    }

    #[test]
    fn test_staleness_propagates_to_dependents() {
        let fx = Fixture::new();
        greet_project(&fx);
        let ctx = fx.ctx();
        {
            let registry = resolved(&fx);
            let tc = fx.toolchain();
            let report = Report::new();
            let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
            check_all(&bctx);
            let ids: Vec<_> = registry.ids().collect();
            assert_eq!(bctx.build_all(&ids), 0);
        }

        fx.touch("lib/util/util.go");

        let registry = resolved(&fx);
        let tc = fx.toolchain();
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        let util = registry.lookup_import("lib/util").unwrap();
        let greet = registry.lookup("greet", TargetKind::Command).unwrap();
        assert!(bctx.check_status(util).0);
        assert!(bctx.check_status(greet).0);

        bctx.build_all(&[greet]);
        assert_eq!(tc.leaf_dirs("archive"), vec!["lib/util"]);
        assert_eq!(tc.leaf_dirs("link"), vec!["cmd/greet"]);
    }

    #[test]
    fn test_diamond_builds_shared_dependency_once() {
        let fx = Fixture::new();
        fx.file("a/main.go", "package main\n\nimport (\n\t\"b\"\n\t\"c\"\n)\n");
        fx.file("b/b.go", "package b\n\nimport \"d\"\n");
        fx.file("c/c.go", "package c\n\nimport \"d\"\n");
        fx.file("d/d.go", "package d\n");

        let ctx = fx.ctx();
        let registry = resolved(&fx);
        let tc = fx.toolchain();
        let report = Report::new();
        let options = BuildOptions {
            concurrent: true,
            jobs: Some(4),
            ..BuildOptions::default()
        };
        let bctx = BuildContext::new(&registry, &ctx, &tc, options, &report);
        check_all(&bctx);

        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(bctx.build_all(&ids), 0);
        assert_eq!(
            tc.leaf_dirs("archive").iter().filter(|d| *d == "d").count(),
            1
        );
        assert_eq!(report.summary().built, 4);
    }

    #[test]
    fn test_partial_failure_isolation() {
        let fx = Fixture::new();
        fx.file("x/x.go", "package x\n\nimport \"y\"\n");
        fx.file("z/z.go", "package z\n\nimport \"y\"\n");
        fx.file("y/y.go", "package y\n");
        fx.file("w/w.go", "package w\n");

        let ctx = fx.ctx();
        let registry = resolved(&fx);
        let tc = fx.toolchain().fail_in("y");
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        check_all(&bctx);

        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(bctx.build_all(&ids), 3);
        assert_eq!(bctx.install_all(&ids), 3);

        let summary = report.summary();
        let dirs: Vec<String> = summary
            .messages
            .iter()
            .map(|m| m.dir.display().to_string())
            .collect();
        assert_eq!(summary.broken, 3);
        assert!(dirs.contains(&"y".to_string()));
        assert!(dirs.contains(&"x".to_string()));
        assert!(dirs.contains(&"z".to_string()));
        assert!(!dirs.contains(&"w".to_string()));
        assert!(summary
            .messages
            .iter()
            .any(|m| m.message.contains("Cannot build deps")));

        assert_eq!(tc.copied(), vec!["_obj/w.a"]);
        assert_eq!(summary.installed, 1);
    }

    #[test]
    fn test_unresolved_import_fails_target() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"no/such\"\n");

        let ctx = fx.ctx();
        let mut registry = fx.scan();
        let report = Report::new();
        resolve_all(&mut registry, &ctx, &Default::default(), &report);

        let tc = fx.toolchain();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        check_all(&bctx);
        let a = registry.lookup_import("a").unwrap();
        assert!(matches!(bctx.build(a), Err(BuildError::Unresolved(_))));
        assert!(tc.calls().is_empty());
        assert!(report.summary().failed());
    }

    #[test]
    fn test_exclusive_mode_skips_unlisted_deps() {
        let fx = Fixture::new();
        greet_project(&fx);
        let ctx = fx.ctx();
        let registry = resolved(&fx);
        let greet = registry.lookup("greet", TargetKind::Command).unwrap();

        let tc = fx.toolchain();
        let report = Report::new();
        let options = BuildOptions {
            exclusive: true,
            ..BuildOptions::default()
        };
        let bctx = BuildContext::new(&registry, &ctx, &tc, options, &report).with_listed([greet]);
        check_all(&bctx);
        bctx.build_all(&[greet]);

        assert!(tc.leaf_dirs("archive").is_empty());
        assert_eq!(tc.leaf_dirs("link"), vec!["cmd/greet"]);
    }

    #[test]
    fn test_fetch_missing_remote() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"github.com/user/lib\"\n");

        let ctx = fx.ctx();
        let mut registry = fx.scan();
        let report = Report::new();
        let opts = crate::resolver::ResolveOptions {
            allow_fetch: true,
            update: false,
        };
        assert!(resolve_all(&mut registry, &ctx, &opts, &report).is_empty());

        let tc = fx.toolchain();
        let options = BuildOptions {
            allow_fetch: true,
            ..BuildOptions::default()
        };
        let bctx = BuildContext::new(&registry, &ctx, &tc, options, &report);
        check_all(&bctx);
        let a = registry.lookup_import("a").unwrap();
        bctx.build(a).unwrap();
        assert_eq!(tc.fetched(), vec!["github.com/user/lib"]);
    }

    #[test]
    fn test_clean_removes_outputs() {
        let fx = Fixture::new();
        greet_project(&fx);
        let ctx = fx.ctx();
        let registry = resolved(&fx);
        let ids: Vec<_> = registry.ids().collect();
        {
            let tc = fx.toolchain();
            let report = Report::new();
            let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
            check_all(&bctx);
            bctx.build_all(&ids);
        }
        fx.file("cmd/greet/_test/_testmain.go", "package main\n");

        let registry = resolved(&fx);
        let tc = fx.toolchain();
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        bctx.clean_all(&ids);

        assert_eq!(report.summary().cleaned, 2);
        assert!(!fx.root().join("bin/greet").exists());
        assert!(!fx.root().join("_obj/lib/util.a").exists());
        assert!(!fx.root().join("cmd/greet/_test").exists());

        // Nothing left the second time round.
        let registry = resolved(&fx);
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        bctx.clean_all(&ids);
        assert_eq!(report.summary().cleaned, 0);
    }

    #[test]
    fn test_tests_compile_link_and_run() {
        let fx = Fixture::new();
        fx.file("m/m.go", "package m\n");
        fx.file(
            "m/m_test.go",
            "package m\n\nimport \"testing\"\n\nfunc TestA(t *testing.T) {}\n",
        );

        let ctx = fx.ctx();
        let mut registry = fx.scan_with_tests();
        let report = Report::new();
        assert!(resolve_all(&mut registry, &ctx, &Default::default(), &report).is_empty());

        let tc = fx.toolchain();
        let options = BuildOptions {
            test_args: vec!["-test.v".into()],
            ..BuildOptions::default()
        };
        let bctx = BuildContext::new(&registry, &ctx, &tc, options, &report);
        check_all(&bctx);
        let m = registry.lookup_import("m").unwrap();
        bctx.test(m).unwrap();

        let calls = tc.calls();
        assert!(calls.iter().any(|c| c.starts_with("compile m ") && c.contains("_testmain.go")));
        assert!(calls.iter().any(|c| c.starts_with("run m ") && c.contains("-test.v")));
        assert!(!fx.root().join("m/_test").exists());
    }

    #[test]
    fn test_testdata_target_is_not_installed() {
        let fx = Fixture::new();
        fx.file("pkg/p.go", "package pkg\n");
        fx.file("pkg/testdata/gb.cfg", "workspace=../..\n");
        fx.file("pkg/testdata/fix/f.go", "package fix\n");

        let ctx = fx.ctx_in("pkg/testdata");
        let mut registry = fx.scan_in("pkg/testdata");
        resolve_all(&mut registry, &ctx, &Default::default(), &Report::new());
        let fix = registry.lookup_import("pkg/testdata/fix").unwrap();

        let tc = fx.toolchain();
        let report = Report::new();
        let bctx = BuildContext::new(&registry, &ctx, &tc, BuildOptions::default(), &report);
        check_all(&bctx);
        bctx.build(fix).unwrap();
        assert!(matches!(bctx.install(fix), Err(BuildError::TestdataInstall)));
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("sum_amd64.s"), "sum_amd64.o");
    }
}
