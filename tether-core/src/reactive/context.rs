//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. While an
//! effect is the innermost entry on the runtime's stack, every tracked read
//! is attributed to it.
//!
//! # Implementation
//!
//! Entering and leaving are paired through guards. [`ReactiveContext`]
//! pushes an effect and pops it when dropped; the tracking guards save the
//! tracking switch and restore it when dropped. Because restoration happens
//! in `Drop`, a panicking body still leaves the stack, the generation bits
//! and the switch exactly as they were before it started.

use super::runtime::Runtime;
use super::EffectId;

/// Guard for one run of an effect.
pub struct ReactiveContext {
    effect: EffectId,
}

impl ReactiveContext {
    /// Enter a run of `effect`.
    ///
    /// Returns `None` if the effect is already running somewhere up the
    /// stack; effects never re-enter themselves.
    pub fn enter(effect: EffectId) -> Option<Self> {
        Runtime::enter(effect).then(|| Self { effect })
    }

    /// Check if any effect is running.
    pub fn is_active() -> bool {
        Runtime::active_effect().is_some()
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<EffectId> {
        Runtime::active_effect()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if Runtime::exit(self.effect) {
            Runtime::stop_effect(self.effect);
        }
    }
}

/// Guard restoring the tracking switch when dropped.
#[must_use = "tracking is restored as soon as the guard is dropped"]
pub struct TrackingGuard {
    _private: (),
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        Runtime::reset_tracking();
    }
}

/// Suspend tracking until the guard is dropped. Nests.
pub fn pause_tracking() -> TrackingGuard {
    Runtime::pause_tracking();
    TrackingGuard { _private: () }
}

/// Force tracking on until the guard is dropped, even inside a paused
/// region.
pub fn enable_tracking() -> TrackingGuard {
    Runtime::enable_tracking();
    TrackingGuard { _private: () }
}

/// Run `f` without recording any reads.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _guard = pause_tracking();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::reactive::Subscriber;

    struct Noop(EffectId);

    impl Subscriber for Noop {
        fn id(&self) -> EffectId {
            self.0
        }
        fn notify(&self) {}
        fn deactivate(&self) {}
    }

    fn registered() -> EffectId {
        let id = EffectId::new();
        Runtime::register(Rc::new(Noop(id)), false);
        id
    }

    #[test]
    fn context_tracks_effect() {
        let id = registered();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_effect(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());
    }

    #[test]
    fn nested_contexts() {
        let id1 = registered();
        let id2 = registered();

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_effect(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_effect(), Some(id2));
                assert!(ReactiveContext::enter(id1).is_none());
            }

            assert_eq!(ReactiveContext::current_effect(), Some(id1));
        }

        assert!(ReactiveContext::current_effect().is_none());
    }

    #[test]
    fn tracking_guards_nest() {
        let id = registered();
        let _ctx = ReactiveContext::enter(id);
        assert!(Runtime::is_tracking());

        {
            let _paused = pause_tracking();
            assert!(!Runtime::is_tracking());
            {
                let _enabled = enable_tracking();
                assert!(Runtime::is_tracking());
            }
            assert!(!Runtime::is_tracking());
        }
        assert!(Runtime::is_tracking());

        assert!(!untracked(Runtime::is_tracking));
    }

    #[test]
    fn panicking_body_restores_stack() {
        let id = registered();
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(id);
            panic!("body failed");
        });

        assert!(result.is_err());
        assert!(ReactiveContext::current_effect().is_none());
        assert!(ReactiveContext::enter(id).is_some());
    }
}
