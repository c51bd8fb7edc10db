//! Registry of every target found in a run.
//!
//! Targets live in an arena and refer to each other by [`TargetId`]. A
//! library and a command may share a qualified name; imports only ever
//! match libraries.

use std::collections::HashMap;
use std::fmt;

use crate::core::target::{Target, TargetKind};

/// Index of a target in its [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of targets keyed by (qualified name, kind).
#[derive(Debug, Default)]
pub struct Registry {
    targets: Vec<Target>,
    by_key: HashMap<(String, TargetKind), TargetId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target. The first registration of a key wins; a later one
    /// from a different directory is reported as a duplicate and dropped.
    pub fn register(&mut self, target: Target) -> Option<TargetId> {
        let key = (target.name.clone(), target.kind);
        if let Some(&existing) = self.by_key.get(&key) {
            let dup = &self.targets[existing.0];
            if dup.abs_dir != target.abs_dir {
                tracing::warn!(
                    "Duplicate target: {}\n in {}\n in {}",
                    target.name,
                    dup.dir.display(),
                    target.dir.display()
                );
            }
            return None;
        }

        let id = TargetId(self.targets.len());
        tracing::debug!("registered {} \"{}\" in {}", target.label(), target.name, target.dir.display());
        self.targets.push(target);
        self.by_key.insert(key, id);
        Some(id)
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.targets[id.0]
    }

    pub fn lookup(&self, name: &str, kind: TargetKind) -> Option<TargetId> {
        self.by_key.get(&(name.to_string(), kind)).copied()
    }

    /// Resolve an import path to a library target.
    pub fn lookup_import(&self, name: &str) -> Option<TargetId> {
        self.lookup(name, TargetKind::Library)
    }

    /// All ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        (0..self.targets.len()).map(TargetId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Target)> + '_ {
        self.targets.iter().enumerate().map(|(i, t)| (TargetId(i), t))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Qualified names of `ids`, in order.
    pub fn names(&self, ids: &[TargetId]) -> Vec<String> {
        ids.iter().map(|&id| self.get(id).name.clone()).collect()
    }
}
