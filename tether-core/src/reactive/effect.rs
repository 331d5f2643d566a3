//! Effect Implementation
//!
//! An effect is a re-runnable tracked computation. Every reactive read made
//! by its body subscribes it to that dependency; a later write to any of
//! them notifies it again.
//!
//! # How Effects Work
//!
//! 1. [`effect`] creates the effect and runs it immediately to establish its
//!    initial dependencies, unless the options ask for a lazy start.
//!
//! 2. When a dependency changes, the effect's scheduler is invoked if it has
//!    one. Otherwise the effect reruns synchronously.
//!
//! 3. Each rerun diffs the dependencies it reads against the ones it held,
//!    dropping subscriptions on branches the body no longer takes.
//!
//! # Lifetime
//!
//! The runtime owns a registered effect. Dropping every handle does not
//! stop it: an effect keeps reacting until [`ReactiveEffect::stop`] is
//! called, at which point it is unsubscribed everywhere, its `on_stop`
//! hook runs and later runs execute the body without tracking.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::{untracked, ReactiveContext};
use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};

type Scheduler = Rc<dyn Fn()>;

struct EffectCore<T> {
    id: EffectId,
    body: Box<dyn Fn() -> T>,
    scheduler: Option<Scheduler>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    active: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T> EffectCore<T> {
    fn run(&self) -> Option<T> {
        if !self.active.get() {
            return Some(untracked(|| (self.body)()));
        }
        let Some(_ctx) = ReactiveContext::enter(self.id) else {
            tracing::trace!(effect = %self.id, "refused re-entrant run");
            return None;
        };
        self.run_count.set(self.run_count.get() + 1);
        Some((self.body)())
    }
}

impl<T> Subscriber for EffectCore<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn notify(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn deactivate(&self) {
        if !self.active.replace(false) {
            return;
        }
        let on_stop = self.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
    }
}

/// Options for [`effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
    on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Call `scheduler` instead of rerunning when a dependency changes.
    pub fn scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Call `on_stop` once when the effect is stopped.
    pub fn on_stop(mut self, on_stop: impl FnOnce() + 'static) -> Self {
        self.on_stop = Some(Box::new(on_stop));
        self
    }
}

/// A re-runnable tracked computation.
///
/// Cloning the handle does not create a new effect.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tether_core::{effect, Ref};
///
/// let count = Ref::new(0);
/// let seen = Rc::new(Cell::new(0.0));
///
/// let runner = effect({
///     let count = count.clone();
///     let seen = seen.clone();
///     move || seen.set(count.get().as_f64().unwrap_or_default())
/// });
///
/// count.set(5).unwrap();
/// assert_eq!(seen.get(), 5.0);
/// runner.stop();
/// ```
pub struct ReactiveEffect<T = ()> {
    core: Rc<EffectCore<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create and register an effect without running it.
    pub fn new(body: impl Fn() -> T + 'static) -> Self {
        Self::build(Box::new(body), None, None, false)
    }

    /// Create and register an effect whose notifications go to `scheduler`.
    pub fn with_scheduler(body: impl Fn() -> T + 'static, scheduler: impl Fn() + 'static) -> Self {
        Self::build(Box::new(body), Some(Rc::new(scheduler)), None, false)
    }

    pub(crate) fn build(
        body: Box<dyn Fn() -> T>,
        scheduler: Option<Scheduler>,
        on_stop: Option<Box<dyn FnOnce()>>,
        computed: bool,
    ) -> Self {
        let core = Rc::new(EffectCore {
            id: EffectId::new(),
            body,
            scheduler,
            on_stop: RefCell::new(on_stop),
            active: Cell::new(true),
            run_count: Cell::new(0),
        });
        Runtime::register(core.clone(), computed);
        Self { core }
    }
}

impl<T> ReactiveEffect<T> {
    /// Run the body, tracking its reads.
    ///
    /// Returns `None` without running if this effect is already running
    /// further up the stack. A stopped effect runs its body untracked.
    pub fn run(&self) -> Option<T> {
        self.core.run()
    }

    /// Stop the effect. Idempotent.
    pub fn stop(&self) {
        Runtime::stop_effect(self.core.id);
    }

    /// Whether the effect is still reacting to changes.
    pub fn is_active(&self) -> bool {
        self.core.active.get()
    }

    pub fn id(&self) -> EffectId {
        self.core.id
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.core.run_count.get()
    }

    /// Number of dependencies the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.core.id)
    }

    /// A handle that does not keep the effect alive once it is stopped.
    pub fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            core: Rc::downgrade(&self.core),
        }
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.core.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .finish()
    }
}

/// Weak counterpart of [`ReactiveEffect`], for schedulers that need to
/// rerun their own effect.
pub struct WeakEffect<T = ()> {
    core: Weak<EffectCore<T>>,
}

impl<T> WeakEffect<T> {
    pub fn upgrade(&self) -> Option<ReactiveEffect<T>> {
        self.core.upgrade().map(|core| ReactiveEffect { core })
    }
}

impl<T> Clone for WeakEffect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

/// Create an effect and run it once.
pub fn effect<T: 'static>(body: impl Fn() -> T + 'static) -> ReactiveEffect<T> {
    effect_with(body, EffectOptions::default())
}

/// Create an effect with options.
pub fn effect_with<T: 'static>(
    body: impl Fn() -> T + 'static,
    options: EffectOptions,
) -> ReactiveEffect<T> {
    let EffectOptions {
        lazy,
        scheduler,
        on_stop,
    } = options;
    let runner = ReactiveEffect::build(Box::new(body), scheduler, on_stop, false);
    if !lazy {
        runner.run();
    }
    runner
}

/// Stop an effect.
pub fn stop<T>(runner: &ReactiveEffect<T>) {
    runner.stop();
}
