//! Dependency Sets
//!
//! A [`Dep`] is the subscriber set for one (target, key) pair, or for the
//! single logical field of a ref or computed value.

use indexmap::IndexSet;
use slotmap::new_key_type;

use crate::reactive::EffectId;

new_key_type! {
    /// Arena handle for a dependency set.
    pub struct DepId;
}

/// The subscribers of one dependency, plus the generation markers used to
/// diff a rerunning effect's old and new dependencies.
///
/// Each nesting depth of running effects owns one bit. `was_tracked` holds
/// that bit while the effect at that depth had this dependency before the
/// current run; `new_tracked` holds it once the current run has read it.
#[derive(Debug, Default)]
pub struct Dep {
    subscribers: IndexSet<EffectId>,
    was_tracked: u32,
    new_tracked: u32,
}

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_tracked(&self, bit: u32) -> bool {
        self.was_tracked & bit > 0
    }

    pub fn new_tracked(&self, bit: u32) -> bool {
        self.new_tracked & bit > 0
    }

    pub fn mark_was_tracked(&mut self, bit: u32) {
        self.was_tracked |= bit;
    }

    pub fn mark_new_tracked(&mut self, bit: u32) {
        self.new_tracked |= bit;
    }

    /// Clear both markers for one depth.
    pub fn clear_markers(&mut self, bit: u32) {
        self.was_tracked &= !bit;
        self.new_tracked &= !bit;
    }

    /// Add a subscriber. Returns false if it was already present.
    pub fn subscribe(&mut self, effect: EffectId) -> bool {
        self.subscribers.insert(effect)
    }

    /// Remove a subscriber, keeping the order of the rest.
    pub fn unsubscribe(&mut self, effect: EffectId) -> bool {
        self.subscribers.shift_remove(&effect)
    }

    pub fn contains(&self, effect: EffectId) -> bool {
        self.subscribers.contains(&effect)
    }

    /// Subscribers in subscription order.
    pub fn subscribers(&self) -> impl Iterator<Item = EffectId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
