//! Petgraph view of the resolved dependency graph.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::core::registry::{Registry, TargetId};

/// Directed graph with an edge from each dependency to its dependent.
#[derive(Debug)]
pub struct DepGraph {
    graph: DiGraph<TargetId, ()>,
    nodes: HashMap<TargetId, NodeIndex>,
}

impl DepGraph {
    /// Build the graph from resolved registry edges.
    pub fn from_registry(registry: &Registry) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for id in registry.ids() {
            nodes.insert(id, graph.add_node(id));
        }
        for (id, target) in registry.iter() {
            for dep in &target.deps {
                graph.add_edge(nodes[dep], nodes[&id], ());
            }
        }
        DepGraph { graph, nodes }
    }

    /// Every target `roots` depend on, roots included.
    pub fn closure(&self, roots: &[TargetId]) -> HashSet<TargetId> {
        let reversed = Reversed(&self.graph);
        let mut seen = HashSet::new();
        for root in roots {
            let Some(&start) = self.nodes.get(root) else {
                continue;
            };
            let mut dfs = Dfs::new(reversed, start);
            while let Some(node) = dfs.next(reversed) {
                seen.insert(self.graph[node]);
            }
        }
        seen
    }

    /// The closure of `roots`, dependencies before dependents.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn build_order(&self, roots: &[TargetId]) -> Option<Vec<TargetId>> {
        let closure = self.closure(roots);
        let sorted = toposort(&self.graph, None).ok()?;
        Some(
            sorted
                .into_iter()
                .map(|node| self.graph[node])
                .filter(|id| closure.contains(id))
                .collect(),
        )
    }

    /// Targets that import `id` directly.
    pub fn dependents(&self, id: TargetId) -> Vec<TargetId> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut dependents: Vec<TargetId> = self
            .graph
            .neighbors(node)
            .map(|n| self.graph[n])
            .collect();
        dependents.sort_by_key(|d| d.index());
        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::Report;
    use crate::resolver::resolve_all;
    use crate::test_support::Fixture;

    fn resolved(fx: &Fixture) -> Registry {
        let mut registry = fx.scan();
        resolve_all(&mut registry, &fx.ctx(), &Default::default(), &Report::new());
        registry
    }

    #[test]
    fn test_build_order_puts_deps_first() {
        let fx = Fixture::new();
        fx.file("app/main.go", "package main\n\nimport \"lib\"\n");
        fx.file("lib/l.go", "package lib\n\nimport \"base\"\n");
        fx.file("base/b.go", "package base\n");
        fx.file("other/o.go", "package other\n");

        let registry = resolved(&fx);
        let graph = DepGraph::from_registry(&registry);
        let app = registry.lookup("app", crate::core::TargetKind::Command).unwrap();

        let order = graph.build_order(&[app]).unwrap();
        assert_eq!(registry.names(&order), vec!["base", "lib", "app"]);
    }

    #[test]
    fn test_dependents() {
        let fx = Fixture::new();
        fx.file("x/x.go", "package x\n\nimport \"y\"\n");
        fx.file("z/z.go", "package z\n\nimport \"y\"\n");
        fx.file("y/y.go", "package y\n");

        let registry = resolved(&fx);
        let graph = DepGraph::from_registry(&registry);
        let y = registry.lookup_import("y").unwrap();
        assert_eq!(registry.names(&graph.dependents(y)), vec!["x", "z"]);
    }

    #[test]
    fn test_cycle_has_no_order() {
        let fx = Fixture::new();
        fx.file("a/a.go", "package a\n\nimport \"b\"\n");
        fx.file("b/b.go", "package b\n\nimport \"a\"\n");

        let registry = resolved(&fx);
        let graph = DepGraph::from_registry(&registry);
        let a = registry.lookup_import("a").unwrap();
        assert!(graph.build_order(&[a]).is_none());
    }
}
