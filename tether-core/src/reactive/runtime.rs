//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects targets, refs,
//! computed values and effects. It owns the dependency store, the effect
//! registry and the stack of running effects.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime.
//!
//! 2. When an effect runs, the runtime pushes it onto the active stack and
//!    marks every dependency it held with the current depth's generation
//!    bit.
//!
//! 3. Every tracked read while it runs subscribes it to the dependency for
//!    that read, unless it was already subscribed.
//!
//! 4. When the run ends, dependencies the effect held before but did not
//!    read this time lose it, and the stack is popped.
//!
//! 5. When a target is written, the runtime resolves the affected
//!    dependencies, snapshots their subscribers, and notifies computed
//!    effects first, then plain effects.
//!
//! # Threading
//!
//! All state is thread-local. Each thread has an independent graph, and
//! values are not `Send`. The state is never borrowed while user code runs,
//! so bodies, schedulers and stop hooks may freely read and write reactive
//! state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::subscriber::{EffectId, Subscriber};
use crate::graph::{DepId, DepKey, DependencyStore, TrackOp, TriggerOp};
use crate::value::{Target, TargetId, TargetKind, Value};

/// Deepest effect nesting that uses generation bits. Deeper runs fall back
/// to unsubscribing the effect from everything before it runs.
pub const MAX_MARKER_BITS: u32 = 30;

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// A registered effect and the dependencies it is subscribed to.
struct EffectSlot {
    subscriber: Rc<dyn Subscriber>,
    deps: Vec<DepId>,
    computed: bool,
    defer_stop: bool,
    /// Bumped every time the runtime notifies this effect.
    notified: u64,
}

struct RuntimeState {
    store: DependencyStore,
    effects: HashMap<EffectId, EffectSlot>,
    /// Running effects, innermost last.
    stack: Vec<EffectId>,
    should_track: bool,
    track_stack: Vec<bool>,
    depth: u32,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            store: DependencyStore::new(),
            effects: HashMap::new(),
            stack: Vec::new(),
            should_track: true,
            track_stack: Vec::new(),
            depth: 0,
        }
    }
}

impl RuntimeState {
    fn uses_markers(&self) -> bool {
        self.depth <= MAX_MARKER_BITS
    }

    fn marker_bit(&self) -> u32 {
        if self.uses_markers() {
            1 << self.depth
        } else {
            0
        }
    }

    fn is_tracking(&self) -> bool {
        self.should_track && !self.stack.is_empty()
    }

    /// Unsubscribe an effect from every dependency it holds.
    fn cleanup_effect(&mut self, id: EffectId) {
        let Some(slot) = self.effects.get_mut(&id) else {
            return;
        };
        for dep in slot.deps.drain(..) {
            if let Some(dep) = self.store.dep_mut(dep) {
                dep.unsubscribe(id);
            }
        }
    }

    fn enter(&mut self, id: EffectId) -> bool {
        if self.stack.contains(&id) {
            return false;
        }
        self.stack.push(id);
        self.track_stack.push(self.should_track);
        self.should_track = true;
        self.depth += 1;

        if self.uses_markers() {
            let bit = self.marker_bit();
            if let Some(slot) = self.effects.get(&id) {
                for dep in &slot.deps {
                    if let Some(dep) = self.store.dep_mut(*dep) {
                        dep.mark_was_tracked(bit);
                    }
                }
            }
        } else {
            self.cleanup_effect(id);
        }
        true
    }

    fn exit(&mut self, id: EffectId) -> bool {
        if self.uses_markers() {
            let bit = self.marker_bit();
            if let Some(slot) = self.effects.get_mut(&id) {
                let store = &mut self.store;
                slot.deps.retain(|dep_id| {
                    let Some(dep) = store.dep_mut(*dep_id) else {
                        return false;
                    };
                    let dropped = dep.was_tracked(bit) && !dep.new_tracked(bit);
                    if dropped {
                        dep.unsubscribe(id);
                    }
                    dep.clear_markers(bit);
                    !dropped
                });
            }
        }

        self.depth = self.depth.saturating_sub(1);
        self.should_track = self.track_stack.pop().unwrap_or(true);
        let popped = self.stack.pop();
        debug_assert_eq!(popped, Some(id), "effect stack mismatch");

        self.effects.get(&id).is_some_and(|slot| slot.defer_stop)
    }

    fn track_dep(&mut self, dep_id: DepId) -> bool {
        let Some(&active) = self.stack.last() else {
            return false;
        };
        let uses_markers = self.uses_markers();
        let bit = self.marker_bit();

        let Some(slot) = self.effects.get_mut(&active) else {
            return false;
        };
        let Some(dep) = self.store.dep_mut(dep_id) else {
            return false;
        };

        let should_add = if uses_markers {
            if dep.new_tracked(bit) {
                false
            } else {
                dep.mark_new_tracked(bit);
                !dep.was_tracked(bit)
            }
        } else {
            !dep.contains(active)
        };

        if should_add {
            dep.subscribe(active);
            slot.deps.push(dep_id);
        }
        should_add
    }

    /// Snapshot the subscribers of `deps`, computed effects first, each with
    /// its notification count at snapshot time.
    fn collect_subscribers(&self, deps: &[DepId]) -> Vec<(Rc<dyn Subscriber>, u64)> {
        let mut ids = IndexSet::new();
        for dep in deps {
            if let Some(dep) = self.store.dep(*dep) {
                ids.extend(dep.subscribers());
            }
        }

        let mut computed = Vec::new();
        let mut plain = Vec::new();
        for id in ids {
            if let Some(slot) = self.effects.get(&id) {
                let entry = (Rc::clone(&slot.subscriber), slot.notified);
                if slot.computed {
                    computed.push(entry);
                } else {
                    plain.push(entry);
                }
            }
        }
        computed.extend(plain);
        computed
    }
}

/// The reactive runtime.
///
/// A zero-sized handle onto the current thread's reactive state.
pub struct Runtime;

impl Runtime {
    fn with<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
        RUNTIME.with(|state| f(&mut state.borrow_mut()))
    }

    /// Like `with`, but gives up quietly while the thread is shutting down
    /// or the state is already borrowed. Used from `Drop` impls.
    fn try_with<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
        RUNTIME
            .try_with(|state| state.try_borrow_mut().ok().map(|mut state| f(&mut state)))
            .ok()
            .flatten()
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Register an effect with the runtime.
    ///
    /// The runtime keeps the subscriber alive until it is stopped.
    pub fn register(subscriber: Rc<dyn Subscriber>, computed: bool) {
        let id = subscriber.id();
        let previous = Self::with(|state| {
            state.effects.insert(
                id,
                EffectSlot {
                    subscriber,
                    deps: Vec::new(),
                    computed,
                    defer_stop: false,
                    notified: 0,
                },
            )
        });
        drop(previous);
        debug!(effect = %id, computed, "effect registered");
    }

    /// Whether an effect is registered (created and not yet stopped).
    pub fn is_registered(id: EffectId) -> bool {
        Self::with(|state| state.effects.contains_key(&id))
    }

    /// Begin a run of `id`. Returns false if it is already running.
    pub(crate) fn enter(id: EffectId) -> bool {
        Self::with(|state| state.enter(id))
    }

    /// End a run of `id`. Returns true if a stop was requested during it.
    pub(crate) fn exit(id: EffectId) -> bool {
        Self::try_with(|state| state.exit(id)).unwrap_or(false)
    }

    /// Stop an effect: unsubscribe it everywhere, unregister it and
    /// deactivate it.
    ///
    /// Stopping an effect that is currently running takes effect when its
    /// run ends. Stopping an effect that is not registered does nothing.
    pub fn stop_effect(id: EffectId) {
        let removed = Self::try_with(|state| {
            if state.stack.contains(&id) {
                if let Some(slot) = state.effects.get_mut(&id) {
                    slot.defer_stop = true;
                }
                return None;
            }
            state.cleanup_effect(id);
            state.effects.remove(&id)
        })
        .flatten();

        if let Some(slot) = removed {
            debug!(effect = %id, "effect stopped");
            slot.subscriber.deactivate();
        }
    }

    /// The innermost running effect.
    pub fn active_effect() -> Option<EffectId> {
        Self::with(|state| state.stack.last().copied())
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        Self::with(|state| state.is_tracking())
    }

    /// Number of dependencies an effect is subscribed to.
    pub fn dependency_count(id: EffectId) -> usize {
        Self::with(|state| state.effects.get(&id).map_or(0, |slot| slot.deps.len()))
    }

    /// Number of registered effects on this thread.
    pub fn effect_count() -> usize {
        Self::with(|state| state.effects.len())
    }

    // ------------------------------------------------------------------
    // Tracking switch
    // ------------------------------------------------------------------

    /// Suspend tracking until the matching [`Runtime::reset_tracking`].
    pub fn pause_tracking() {
        Self::with(|state| {
            state.track_stack.push(state.should_track);
            state.should_track = false;
        });
    }

    /// Force tracking on until the matching [`Runtime::reset_tracking`].
    pub fn enable_tracking() {
        Self::with(|state| {
            state.track_stack.push(state.should_track);
            state.should_track = true;
        });
    }

    /// Restore the tracking state saved by the last pause or enable.
    pub fn reset_tracking() {
        Self::try_with(|state| {
            state.should_track = state.track_stack.pop().unwrap_or(true);
        });
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    /// Allocate a standalone dependency, as owned by a ref or computed.
    pub fn allocate_dep() -> DepId {
        Self::with(|state| state.store.allocate())
    }

    /// Release a standalone dependency.
    pub fn release_dep(dep: DepId) {
        let removed = Self::try_with(|state| state.store.release(dep));
        drop(removed);
    }

    /// Discard every dependency of a target that no longer exists.
    pub fn forget_target(target: TargetId) {
        let removed = Self::try_with(|state| state.store.forget_target(target));
        drop(removed);
    }

    /// Record that the active effect reads `key` of `target`.
    pub fn track(target: TargetId, op: TrackOp, key: DepKey) {
        let tracked = Self::with(|state| {
            if !state.is_tracking() {
                return false;
            }
            let dep = state.store.dep_for(target, &key);
            state.track_dep(dep);
            true
        });
        if tracked {
            trace!(target_id = %target, key = %key, ?op, "track");
        }
    }

    /// Record that the active effect reads a standalone dependency.
    pub fn track_dep(dep: DepId) {
        Self::with(|state| {
            if state.is_tracking() {
                state.track_dep(dep);
            }
        });
    }

    /// Notify the subscribers of every dependency one write affects.
    pub fn trigger(
        target: TargetId,
        kind: TargetKind,
        op: TriggerOp,
        key: Option<DepKey>,
        new_length: Option<usize>,
    ) {
        let subscribers = Self::with(|state| {
            let deps = state
                .store
                .resolve(target, kind, op, key.as_ref(), new_length);
            state.collect_subscribers(&deps)
        });
        if let Some(key) = &key {
            trace!(target_id = %target, key = %key, ?op, subscribers = subscribers.len(), "trigger");
        } else {
            trace!(target_id = %target, ?op, subscribers = subscribers.len(), "trigger");
        }
        Self::notify(subscribers);
    }

    /// Notify the subscribers of a standalone dependency.
    pub fn trigger_dep(dep: DepId) {
        let subscribers = Self::with(|state| state.collect_subscribers(&[dep]));
        Self::notify(subscribers);
    }

    fn notify(subscribers: Vec<(Rc<dyn Subscriber>, u64)>) {
        for (subscriber, stamp) in &subscribers {
            let id = subscriber.id();
            // A write inside a body must not rerun that body. An effect
            // stopped by an earlier notification in this batch stays quiet,
            // and so does one already notified since the snapshot, as when a
            // computed it reads has rerun it.
            let due = Self::with(|state| {
                if state.stack.last() == Some(&id) {
                    return false;
                }
                match state.effects.get_mut(&id) {
                    Some(slot) if slot.notified == *stamp => {
                        slot.notified += 1;
                        true
                    }
                    _ => false,
                }
            });
            if due {
                subscriber.notify();
            }
        }
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(target: &Target, key: &DepKey) -> usize {
        Self::with(|state| {
            state
                .store
                .lookup(target.id(), key)
                .and_then(|dep| state.store.dep(dep))
                .map_or(0, |dep| dep.len())
        })
    }

    /// Number of effects subscribed to a standalone dependency.
    pub fn dep_subscriber_count(dep: DepId) -> usize {
        Self::with(|state| state.store.dep(dep).map_or(0, |dep| dep.len()))
    }

    /// Number of targets with at least one tracked key.
    pub fn tracked_target_count() -> usize {
        Self::with(|state| state.store.tracked_target_count())
    }
}

/// Record that the active effect reads `key` of `target`.
///
/// Does nothing outside an effect or while tracking is paused.
pub fn track(target: &Target, op: TrackOp, key: impl Into<DepKey>) {
    Runtime::track(target.id(), op, key.into());
}

/// Announce a write to `target`.
///
/// `new_value` is the written value; it is consulted when the write is to
/// an array's `length`.
pub fn trigger(target: &Target, op: TriggerOp, key: Option<DepKey>, new_value: Option<&Value>) {
    let new_length = new_value.and_then(|value| value.as_array_length().ok());
    Runtime::trigger(target.id(), target.kind(), op, key, new_length);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::value::PropKey;

    struct MockSubscriber {
        id: EffectId,
        notified: Cell<u32>,
        deactivated: Cell<bool>,
    }

    impl MockSubscriber {
        fn register(computed: bool) -> Rc<Self> {
            let mock = Rc::new(Self {
                id: EffectId::new(),
                notified: Cell::new(0),
                deactivated: Cell::new(false),
            });
            Runtime::register(mock.clone(), computed);
            mock
        }
    }

    impl Subscriber for MockSubscriber {
        fn id(&self) -> EffectId {
            self.id
        }

        fn notify(&self) {
            self.notified.set(self.notified.get() + 1);
        }

        fn deactivate(&self) {
            self.deactivated.set(true);
        }
    }

    fn prop(name: &str) -> DepKey {
        DepKey::Prop(PropKey::from(name))
    }

    fn run_tracking(id: EffectId, reads: impl FnOnce()) {
        assert!(Runtime::enter(id));
        reads();
        Runtime::exit(id);
    }

    #[test]
    fn runtime_registers_and_stops() {
        let mock = MockSubscriber::register(false);
        assert!(Runtime::is_registered(mock.id));

        Runtime::stop_effect(mock.id);
        assert!(!Runtime::is_registered(mock.id));
        assert!(mock.deactivated.get());
    }

    #[test]
    fn track_is_noop_outside_effects() {
        let target = Target::object();
        Runtime::track(target.id(), TrackOp::Get, prop("a"));
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 0);
        assert_eq!(Runtime::tracked_target_count(), 0);
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        run_tracking(mock.id, || {
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
        });
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 1);

        trigger(&target, TriggerOp::Set, Some(prop("a")), None);
        assert_eq!(mock.notified.get(), 1);

        trigger(&target, TriggerOp::Set, Some(prop("b")), None);
        assert_eq!(mock.notified.get(), 1);

        Runtime::stop_effect(mock.id);
    }

    #[test]
    fn rerun_drops_unread_dependencies() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        run_tracking(mock.id, || {
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
            Runtime::track(target.id(), TrackOp::Get, prop("b"));
        });
        assert_eq!(Runtime::dependency_count(mock.id), 2);

        run_tracking(mock.id, || {
            Runtime::track(target.id(), TrackOp::Get, prop("b"));
        });
        assert_eq!(Runtime::dependency_count(mock.id), 1);
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 0);
        assert_eq!(Runtime::subscriber_count(&target, &prop("b")), 1);

        Runtime::stop_effect(mock.id);
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        run_tracking(mock.id, || {
            for _ in 0..3 {
                Runtime::track(target.id(), TrackOp::Get, prop("a"));
            }
        });
        assert_eq!(Runtime::dependency_count(mock.id), 1);

        Runtime::stop_effect(mock.id);
    }

    #[test]
    fn reentry_is_refused() {
        let mock = MockSubscriber::register(false);
        assert!(Runtime::enter(mock.id));
        assert!(!Runtime::enter(mock.id));
        Runtime::exit(mock.id);
        assert_eq!(Runtime::active_effect(), None);

        Runtime::stop_effect(mock.id);
    }

    #[test]
    fn active_effect_is_not_notified() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        run_tracking(mock.id, || {
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
            trigger(&target, TriggerOp::Set, Some(prop("a")), None);
        });
        assert_eq!(mock.notified.get(), 0);

        Runtime::stop_effect(mock.id);
    }

    struct Relay {
        id: EffectId,
        dep: DepId,
    }

    impl Subscriber for Relay {
        fn id(&self) -> EffectId {
            self.id
        }

        fn notify(&self) {
            Runtime::trigger_dep(self.dep);
        }

        fn deactivate(&self) {}
    }

    #[test]
    fn effect_notified_by_nested_trigger_is_skipped_in_outer_batch() {
        let target = Target::object();
        let relay = Rc::new(Relay {
            id: EffectId::new(),
            dep: Runtime::allocate_dep(),
        });
        Runtime::register(relay.clone(), true);
        let mock = MockSubscriber::register(false);

        run_tracking(relay.id, || {
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
        });
        run_tracking(mock.id, || {
            Runtime::track_dep(relay.dep);
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
        });

        trigger(&target, TriggerOp::Set, Some(prop("a")), None);
        assert_eq!(mock.notified.get(), 1);

        trigger(&target, TriggerOp::Set, Some(prop("a")), None);
        assert_eq!(mock.notified.get(), 2);

        Runtime::stop_effect(mock.id);
        Runtime::stop_effect(relay.id);
        Runtime::release_dep(relay.dep);
    }

    #[test]
    fn stop_inside_run_is_deferred() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        assert!(Runtime::enter(mock.id));
        Runtime::track(target.id(), TrackOp::Get, prop("a"));
        Runtime::stop_effect(mock.id);
        assert!(Runtime::is_registered(mock.id));
        assert!(Runtime::exit(mock.id));

        Runtime::stop_effect(mock.id);
        assert!(!Runtime::is_registered(mock.id));
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 0);
    }

    #[test]
    fn deep_nesting_falls_back_to_full_cleanup() {
        let target = Target::object();
        let mocks: Vec<_> = (0..MAX_MARKER_BITS + 2)
            .map(|_| MockSubscriber::register(false))
            .collect();

        for mock in &mocks {
            assert!(Runtime::enter(mock.id));
        }
        let innermost = mocks.last().map(|mock| mock.id);
        Runtime::track(target.id(), TrackOp::Get, prop("a"));
        Runtime::track(target.id(), TrackOp::Get, prop("a"));
        for mock in mocks.iter().rev() {
            Runtime::exit(mock.id);
        }

        assert_eq!(innermost.map(Runtime::dependency_count), Some(1));
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 1);

        for mock in &mocks {
            Runtime::stop_effect(mock.id);
        }
    }

    #[test]
    fn computed_subscribers_come_first() {
        let target = Target::object();
        let plain = MockSubscriber::register(false);
        let computed = MockSubscriber::register(true);

        for mock in [&plain, &computed] {
            run_tracking(mock.id, || {
                Runtime::track(target.id(), TrackOp::Get, prop("a"));
            });
        }

        let order = Runtime::with(|state| {
            let dep = state.store.lookup(target.id(), &prop("a"));
            let deps: Vec<_> = dep.into_iter().collect();
            state
                .collect_subscribers(&deps)
                .iter()
                .map(|(subscriber, _)| subscriber.id())
                .collect::<Vec<_>>()
        });
        assert_eq!(order, vec![computed.id, plain.id]);

        Runtime::stop_effect(plain.id);
        Runtime::stop_effect(computed.id);
    }

    #[test]
    fn paused_tracking_records_nothing() {
        let target = Target::object();
        let mock = MockSubscriber::register(false);

        run_tracking(mock.id, || {
            Runtime::pause_tracking();
            Runtime::track(target.id(), TrackOp::Get, prop("a"));
            Runtime::reset_tracking();
            Runtime::track(target.id(), TrackOp::Get, prop("b"));
        });
        assert_eq!(Runtime::subscriber_count(&target, &prop("a")), 0);
        assert_eq!(Runtime::subscriber_count(&target, &prop("b")), 1);

        Runtime::stop_effect(mock.id);
    }

    #[test]
    fn dropped_targets_are_forgotten() {
        let mock = MockSubscriber::register(false);
        let before = Runtime::tracked_target_count();
        {
            let target = Target::object();
            run_tracking(mock.id, || {
                Runtime::track(target.id(), TrackOp::Get, prop("a"));
            });
            assert_eq!(Runtime::tracked_target_count(), before + 1);
        }
        assert_eq!(Runtime::tracked_target_count(), before);

        Runtime::stop_effect(mock.id);
    }
}
