//! Import cycle detection.
//!
//! A depth-first walk along resolved dependency edges. The first node seen
//! twice on the current path closes a cycle; the cycle is reported as the
//! part of the path from that node's first occurrence onwards, repeated
//! node included at both ends.

use std::collections::HashSet;

use crate::core::registry::{Registry, TargetId};

/// Find a cycle reachable from `start`.
pub fn detect_cycle(registry: &Registry, start: TargetId) -> Option<Vec<TargetId>> {
    let mut path = Vec::new();
    let mut done = HashSet::new();
    walk(registry, start, &mut path, &mut done)
}

/// Find the first cycle reachable from any target, in registration order.
pub fn find_any_cycle(registry: &Registry) -> Option<Vec<TargetId>> {
    let mut done = HashSet::new();
    for id in registry.ids() {
        let mut path = Vec::new();
        if let Some(cycle) = walk(registry, id, &mut path, &mut done) {
            return Some(cycle);
        }
    }
    None
}

fn walk(
    registry: &Registry,
    id: TargetId,
    path: &mut Vec<TargetId>,
    done: &mut HashSet<TargetId>,
) -> Option<Vec<TargetId>> {
    if let Some(pos) = path.iter().position(|&p| p == id) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(id);
        return Some(cycle);
    }
    // Fully explored without finding a cycle.
    if done.contains(&id) {
        return None;
    }

    path.push(id);
    for &dep in &registry.get(id).deps {
        if let Some(cycle) = walk(registry, dep, path, done) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(id);
    None
}
