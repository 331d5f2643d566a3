//! Subscriber types for the reactive system.
//!
//! A subscriber is anything the runtime can notify when a dependency
//! changes: plain effects and the effects backing computed values.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an effect.
///
/// Each effect gets a unique ID when created. Dependency sets store these
/// IDs rather than references to the effects themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// A computation registered with the runtime.
pub trait Subscriber {
    /// The subscriber's ID.
    fn id(&self) -> EffectId;

    /// React to a dependency change: invoke the scheduler if there is one,
    /// otherwise rerun.
    fn notify(&self);

    /// Mark the subscriber inactive and release caller-registered cleanup.
    /// Called once, after the runtime has unsubscribed it everywhere.
    fn deactivate(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
        assert!(id1 < id2);
    }
}
