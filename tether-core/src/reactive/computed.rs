//! Computed Implementation
//!
//! A computed value is a cached derived value that recomputes only when
//! its dependencies change, and only when read.
//!
//! # State Machine
//!
//! A computed value is either [`ComputedState::Dirty`] or
//! [`ComputedState::Clean`], and starts dirty.
//!
//! - Reading a dirty value runs the getter inside the computed's own
//!   effect, caches the result and becomes clean.
//! - Reading a clean value returns the cache.
//! - When a dependency changes, the effect's scheduler marks the value
//!   dirty. Only the clean → dirty transition notifies the computed's own
//!   subscribers, so a burst of upstream writes produces one downstream
//!   notification. The getter never runs at write time.
//!
//! Computed values are themselves trackable: an effect that reads one is
//! notified when it becomes dirty.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::warn;

use super::effect::ReactiveEffect;
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::DepId;

/// State of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,
    /// The getter must run before the next read returns.
    Dirty,
}

struct ComputedInner<T> {
    effect: ReactiveEffect<T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    dep: DepId,
    setter: Option<Box<dyn Fn(T)>>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
        Runtime::release_dep(self.dep);
    }
}

/// Restores the dirty flag unless the recomputation completed.
struct DirtyGuard<'a> {
    dirty: &'a Cell<bool>,
    armed: bool,
}

impl Drop for DirtyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.dirty.set(true);
        }
    }
}

/// A lazily recomputed, cached derived value.
///
/// # Example
///
/// ```rust
/// use tether_core::{Computed, Ref};
///
/// let base = Ref::new(2);
/// let doubled = Computed::new({
///     let base = base.clone();
///     move || base.get().as_f64().unwrap_or_default() * 2.0
/// });
///
/// assert_eq!(doubled.get(), 4.0);
/// base.set(5).unwrap();
/// assert_eq!(doubled.get(), 10.0);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a getter-only computed value. The getter does not run until
    /// the first read.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(Box::new(getter), None)
    }

    /// Create a computed value whose writes go to `setter`.
    pub fn writable(getter: impl Fn() -> T + 'static, setter: impl Fn(T) + 'static) -> Self {
        Self::build(Box::new(getter), Some(Box::new(setter)))
    }

    fn build(getter: Box<dyn Fn() -> T>, setter: Option<Box<dyn Fn(T)>>) -> Self {
        let dep = Runtime::allocate_dep();
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler = move || {
                if let Some(inner) = weak.upgrade() {
                    if !inner.dirty.replace(true) {
                        Runtime::trigger_dep(inner.dep);
                    }
                }
            };
            ComputedInner {
                effect: ReactiveEffect::build(getter, Some(Rc::new(scheduler)), None, true),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                dep,
                setter,
            }
        });
        Self { inner }
    }

    /// Read the value, recomputing first if it is dirty.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this computed value before it has ever
    /// produced one. Use [`Computed::try_get`] to handle that case.
    #[track_caller]
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("Computed::get on a value with no result yet: {err}"),
        }
    }

    /// Read the value, recomputing first if it is dirty.
    ///
    /// Fails with [`ReactiveError::CyclicComputed`] when the getter reads its
    /// own computed value before any value was cached.
    pub fn try_get(&self) -> Result<T> {
        let inner = &self.inner;
        Runtime::track_dep(inner.dep);

        if inner.dirty.get() {
            inner.dirty.set(false);
            let mut guard = DirtyGuard {
                dirty: &inner.dirty,
                armed: true,
            };
            if let Some(value) = inner.effect.run() {
                guard.armed = false;
                let previous = inner.value.replace(Some(value));
                drop(previous);
            }
        }

        inner
            .value
            .borrow()
            .clone()
            .ok_or(ReactiveError::CyclicComputed)
    }

    /// Write through the setter.
    ///
    /// A getter-only computed value discards the write and reports
    /// [`ReactiveError::ReadonlyComputed`].
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                warn!("write operation failed: computed value is readonly");
                Err(ReactiveError::ReadonlyComputed)
            }
        }
    }
}

impl<T> Computed<T> {
    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.get() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// Whether a setter was supplied.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Check if a value has been cached.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.inner.effect
    }

    /// Number of effects subscribed to this computed value.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dep_subscriber_count(self.inner.dep)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Create a getter-only computed value.
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
