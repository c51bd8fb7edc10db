//! Dependency resolution.
//!
//! Every import of every target is matched against the registry first.
//! Imports no target provides must be satisfied from outside the tree: a
//! prebuilt archive in an install location, a standard-library source
//! directory, or (for remote-shaped paths) a fetch at build time.

pub mod cycle;
pub mod errors;
pub mod graph;
pub mod remote;

pub use cycle::{detect_cycle, find_any_cycle};
pub use errors::ResolveError;
pub use graph::DepGraph;

use std::collections::BTreeSet;

use crate::core::facts::INTEROP_IMPORT;
use crate::core::registry::{Registry, TargetId};
use crate::core::report::Report;
use crate::core::target::Target;
use crate::util::context::GlobalContext;
use crate::util::fs::Mtime;

/// Resolution switches taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Missing remote packages will be fetched, so they are not errors.
    pub allow_fetch: bool,
    /// Remote packages are refreshed, so their dependents must rebuild.
    pub update: bool,
}

#[derive(Debug, Default)]
struct Edges {
    deps: Vec<TargetId>,
    external_time: Mtime,
    remote: Vec<String>,
    missing_remote: Vec<String>,
    unresolved: Vec<String>,
    needs_build: bool,
}

/// Resolve every target in the registry.
pub fn resolve_all(
    registry: &mut Registry,
    ctx: &GlobalContext,
    opts: &ResolveOptions,
    report: &Report,
) -> Vec<ResolveError> {
    let ids: Vec<TargetId> = registry.ids().collect();
    ids.into_iter()
        .flat_map(|id| resolve(registry, id, ctx, opts, report))
        .collect()
}

/// Resolve one target's imports into dependency edges, external freshness
/// and the list of remote packages it needs. Unsatisfied imports are
/// returned and also recorded on the target and in `report`.
pub fn resolve(
    registry: &mut Registry,
    id: TargetId,
    ctx: &GlobalContext,
    opts: &ResolveOptions,
    report: &Report,
) -> Vec<ResolveError> {
    let target = registry.get(id);
    let mut edges = Edges::default();
    resolve_imports(registry, target, &target.imports, ctx, opts, &mut edges);

    let mut test_edges = Edges::default();
    resolve_imports(registry, target, &target.test_imports, ctx, opts, &mut test_edges);
    test_edges.deps.retain(|&dep| dep != id);

    let dir = target.dir.clone();
    let mut errors = Vec::new();
    for import in edges.unresolved.iter().chain(&test_edges.unresolved) {
        let err = ResolveError::UnresolvedImport {
            dir: dir.clone(),
            import: import.clone(),
        };
        tracing::warn!("{}", err);
        report.record_unresolved(&dir, format!("could not resolve import \"{}\"", import));
        errors.push(err);
    }

    let target = registry.get_mut(id);
    target.deps = edges.deps;
    target.test_deps = test_edges.deps;
    target.external_time = edges.external_time;
    target.remote_imports = edges.remote;
    target.missing_remote = edges.missing_remote;
    target.unresolved = edges.unresolved;
    if edges.needs_build {
        target.lock().needs_build = true;
    }

    errors
}

fn resolve_imports(
    registry: &Registry,
    target: &Target,
    imports: &BTreeSet<String>,
    ctx: &GlobalContext,
    opts: &ResolveOptions,
    edges: &mut Edges,
) {
    let env = ctx.env();
    for name in imports {
        if name == INTEROP_IMPORT {
            continue;
        }
        if name.starts_with("./") || name.starts_with("../") {
            tracing::warn!(
                "(in {}) gb does not support relative import \"{}\"",
                target.dir.display(),
                name
            );
            continue;
        }

        if let Some(dep) = registry.lookup_import(name) {
            if !edges.deps.contains(&dep) {
                edges.deps.push(dep);
            }
            continue;
        }

        let prebuilt = env.prebuilt_archive(name);
        if let Some(time) = prebuilt {
            edges.external_time = edges.external_time.max(time);
        }

        if remote::is_retired(name) {
            tracing::warn!(
                "(in {}) hosting format of \"{}\" is no longer accepted",
                target.dir.display(),
                name
            );
        } else if remote::is_fetchable(name) {
            edges.remote.push(name.clone());
            if opts.update {
                edges.needs_build = true;
            }
            if prebuilt.is_none() {
                if opts.allow_fetch {
                    edges.missing_remote.push(name.clone());
                    edges.needs_build = true;
                } else {
                    edges.unresolved.push(name.clone());
                }
            }
            continue;
        }

        if prebuilt.is_none() && !env.stdlib_source_exists(name) {
            edges.unresolved.push(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn test_local_edges_and_stdlib() {
        let fx = Fixture::new();
        fx.file("util/u.go", "package util\n\nimport \"fmt\"\n");
        fx.file("cmds/greet/main.go", "package main\n\nimport (\n\t\"fmt\"\n\t\"util\"\n)\n");

        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &Report::new());
        assert!(errors.is_empty(), "{errors:?}");

        let greet = registry.lookup("greet", crate::core::TargetKind::Command).unwrap();
        let util = registry.lookup_import("util").unwrap();
        assert_eq!(registry.get(greet).deps, vec![util]);
        assert!(registry.get(greet).external_time.is_some());
    }

    #[test]
    fn test_unresolved_import() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"no/such/pkg\"\n");

        let mut registry = fx.scan();
        let report = Report::new();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &report);
        assert_eq!(errors.len(), 1);
        let a = registry.lookup_import("a").unwrap();
        assert_eq!(registry.get(a).unresolved, vec!["no/such/pkg"]);
        assert_eq!(report.summary().unresolved, 1);
    }

    #[test]
    fn test_remote_import_without_fetch_is_unresolved() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"github.com/user/lib\"\n");

        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &Report::new());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_remote_import_with_fetch() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"github.com/user/lib\"\n");

        let mut registry = fx.scan();
        let opts = ResolveOptions {
            allow_fetch: true,
            update: false,
        };
        let errors = resolve_all(&mut registry, &fx.ctx(), &opts, &Report::new());
        assert!(errors.is_empty());

        let a = registry.get(registry.lookup_import("a").unwrap());
        assert_eq!(a.missing_remote, vec!["github.com/user/lib"]);
        assert!(a.lock().needs_build);
    }

    #[test]
    fn test_installed_remote_is_satisfied() {
        let fx = Fixture::new();
        fx.stdlib_archive("github.com/user/lib");
        fx.file("a/a.go", "package a\n\nimport \"github.com/user/lib\"\n");

        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &Report::new());
        assert!(errors.is_empty());
        let a = registry.get(registry.lookup_import("a").unwrap());
        assert!(a.missing_remote.is_empty());
        assert_eq!(a.remote_imports, vec!["github.com/user/lib"]);
        assert!(!a.lock().needs_build);
    }

    #[test]
    fn test_relative_import_is_skipped() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"./b\"\n");

        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &Report::new());
        assert!(errors.is_empty());
        assert!(registry.get(registry.lookup_import("a").unwrap()).deps.is_empty());
    }

    #[test]
    fn test_interop_import_is_not_an_edge() {
        let fx = Fixture::new();
        fx.file("z/z.go", "package z\n\nimport \"C\"\n");

        let mut registry = fx.scan();
        let errors = resolve_all(&mut registry, &fx.ctx(), &ResolveOptions::default(), &Report::new());
        assert!(errors.is_empty());
    }
}
