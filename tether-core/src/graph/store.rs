//! Dependency Store
//!
//! The store maps each observed target to its per-key dependency sets and
//! owns every [`Dep`] in a single arena. Standalone deps (the value slot of a
//! ref or computed) live in the same arena without a target entry.
//!
//! # Resolution
//!
//! [`DependencyStore::resolve`] turns one write into the deps it affects:
//!
//! 1. `Clear` affects every dep of the target.
//! 2. Setting an array's `length` affects the `length` dep and every index
//!    dep at or beyond the new length.
//! 3. Otherwise the written key's dep, plus the structural deps the write
//!    can change:
//!    - `Add` on a non-array: `Iterate`, and `MapKeyIterate` for a Map.
//!    - `Add` of an array index: `length`.
//!    - `Delete` on a non-array: `Iterate`, and `MapKeyIterate` for a Map.
//!    - `Set` on a Map: `Iterate`.

use std::collections::HashMap;

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::dep::{Dep, DepId};
use super::key::{DepKey, TriggerOp};
use crate::value::{PropKey, TargetId, TargetKind};

/// Arena of dependency sets plus the target → key → dep index.
#[derive(Debug, Default)]
pub struct DependencyStore {
    deps: SlotMap<DepId, Dep>,
    targets: HashMap<TargetId, HashMap<DepKey, DepId>>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a dep that belongs to no target.
    pub fn allocate(&mut self) -> DepId {
        self.deps.insert(Dep::new())
    }

    /// Remove a dep from the arena, returning it so the caller controls
    /// when it is dropped.
    pub fn release(&mut self, id: DepId) -> Option<Dep> {
        self.deps.remove(id)
    }

    pub fn dep(&self, id: DepId) -> Option<&Dep> {
        self.deps.get(id)
    }

    pub fn dep_mut(&mut self, id: DepId) -> Option<&mut Dep> {
        self.deps.get_mut(id)
    }

    /// The dep for `(target, key)`, created on first use.
    pub fn dep_for(&mut self, target: TargetId, key: &DepKey) -> DepId {
        let keyed = self.targets.entry(target).or_default();
        if let Some(dep) = keyed.get(key) {
            return *dep;
        }
        let dep = self.deps.insert(Dep::new());
        keyed.insert(key.clone(), dep);
        dep
    }

    /// The dep for `(target, key)` if one was ever tracked.
    pub fn lookup(&self, target: TargetId, key: &DepKey) -> Option<DepId> {
        self.targets.get(&target)?.get(key).copied()
    }

    /// The deps affected by one write to `target`.
    ///
    /// `new_length` is consulted only for writes to an array's `length`.
    pub fn resolve(
        &self,
        target: TargetId,
        kind: TargetKind,
        op: TriggerOp,
        key: Option<&DepKey>,
        new_length: Option<usize>,
    ) -> SmallVec<[DepId; 4]> {
        let Some(keyed) = self.targets.get(&target) else {
            return SmallVec::new();
        };

        if op == TriggerOp::Clear {
            return keyed.values().copied().collect();
        }

        let is_array = kind == TargetKind::Array;
        let is_map = kind == TargetKind::Map;

        if let (true, Some(DepKey::Prop(prop))) = (is_array, key) {
            if prop.is_length() {
                let new_length = new_length.unwrap_or(0);
                return keyed
                    .iter()
                    .filter(|(key, _)| match key {
                        DepKey::Prop(PropKey::Index(index)) => *index >= new_length,
                        DepKey::Prop(prop) => prop.is_length(),
                        _ => false,
                    })
                    .map(|(_, dep)| *dep)
                    .collect();
            }
        }

        let mut affected = SmallVec::new();
        let mut push = |key: &DepKey| {
            if let Some(dep) = keyed.get(key) {
                affected.push(*dep);
            }
        };

        if let Some(key) = key {
            push(key);
        }

        match op {
            TriggerOp::Add => {
                if !is_array {
                    push(&DepKey::Iterate);
                    if is_map {
                        push(&DepKey::MapKeyIterate);
                    }
                } else if matches!(key, Some(DepKey::Prop(PropKey::Index(_)))) {
                    push(&DepKey::Prop(PropKey::length()));
                }
            }
            TriggerOp::Delete => {
                if !is_array {
                    push(&DepKey::Iterate);
                    if is_map {
                        push(&DepKey::MapKeyIterate);
                    }
                }
            }
            TriggerOp::Set => {
                if is_map {
                    push(&DepKey::Iterate);
                }
            }
            TriggerOp::Clear => {}
        }

        affected
    }

    /// Remove every dep of a target that no longer exists.
    ///
    /// The removed keys and deps are returned so the caller can drop them
    /// outside any borrow.
    pub fn forget_target(&mut self, target: TargetId) -> (HashMap<DepKey, DepId>, Vec<Dep>) {
        let Some(keyed) = self.targets.remove(&target) else {
            return (HashMap::new(), Vec::new());
        };
        let removed = keyed
            .values()
            .filter_map(|dep| self.deps.remove(*dep))
            .collect();
        (keyed, removed)
    }

    /// Number of targets with at least one tracked key.
    pub fn tracked_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Number of live deps, standalone ones included.
    pub fn dep_count(&self) -> usize {
        self.deps.len()
    }
}
