//! Ref Implementation
//!
//! A [`Ref`] gives a single value the tracking contract. Primitives cannot
//! be intercepted, so the box itself owns one dependency: reading the box
//! subscribes the running effect, writing a different value notifies it.
//!
//! # Variants
//!
//! - A value ref ([`Ref::new`]) stores the raw value plus a working value.
//!   Object payloads are wrapped deeply in a reactive handle unless the ref
//!   is shallow ([`Ref::shallow`]).
//! - A property ref ([`to_ref`]) forwards to one key of an object and relies
//!   on that object's own tracking.
//! - A custom ref ([`custom_ref`]) lets the caller decide when to track and
//!   trigger.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use super::context::untracked;
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::DepId;
use crate::proxy::{is_proxy, is_readonly, is_shallow, to_raw, to_reactive};
use crate::value::{has_changed, PropKey, Value};

enum RefKind {
    Value {
        raw: RefCell<Value>,
        value: RefCell<Value>,
        shallow: bool,
    },
    Property {
        object: Value,
        key: PropKey,
        default: Option<Value>,
    },
    Custom {
        get: Box<dyn Fn() -> Value>,
        set: Box<dyn Fn(Value)>,
    },
}

struct RefInner {
    dep: DepId,
    kind: RefKind,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        Runtime::release_dep(self.dep);
    }
}

/// A single-value reactive box.
///
/// Cloning the handle does not copy the box.
///
/// # Example
///
/// ```rust
/// use tether_core::{Ref, Value};
///
/// let count = Ref::new(0);
/// count.set(5).unwrap();
/// assert_eq!(count.get(), Value::from(5));
///
/// count.update(|n| Value::from(n.as_f64().unwrap_or_default() + 1.0)).unwrap();
/// assert_eq!(count.get(), Value::from(6));
/// ```
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    fn from_kind(kind: RefKind) -> Self {
        Self(Rc::new(RefInner {
            dep: Runtime::allocate_dep(),
            kind,
        }))
    }

    /// Create a ref. Object payloads are stored as deep reactive handles.
    ///
    /// Passing a value that already is a ref returns that ref.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::create(value.into(), false)
    }

    /// Create a ref that stores its payload as-is.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::create(value.into(), true)
    }

    fn create(value: Value, shallow: bool) -> Self {
        if let Value::Ref(existing) = value {
            return existing;
        }
        let (raw, working) = if shallow {
            (value.clone(), value)
        } else {
            (to_raw(&value), to_reactive(value))
        };
        Self::from_kind(RefKind::Value {
            raw: RefCell::new(raw),
            value: RefCell::new(working),
            shallow,
        })
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        match &self.0.kind {
            RefKind::Value { value, .. } => {
                Runtime::track_dep(self.0.dep);
                value.borrow().clone()
            }
            RefKind::Property {
                object,
                key,
                default,
            } => {
                let value = object.get(key);
                match (value.is_undefined(), default) {
                    (true, Some(default)) => default.clone(),
                    _ => value,
                }
            }
            RefKind::Custom { get, .. } => get(),
        }
    }

    /// Read the value without subscribing anything.
    pub fn get_untracked(&self) -> Value {
        match &self.0.kind {
            RefKind::Value { value, .. } => value.borrow().clone(),
            _ => untracked(|| self.get()),
        }
    }

    /// Write the value.
    ///
    /// A value ref notifies its subscribers only when the raw value actually
    /// changes. Readonly and shallow handles are stored as given; any other
    /// handle is unwrapped to its raw target first and rewrapped deeply
    /// unless the ref is shallow.
    ///
    /// Fails only for a property ref over a readonly object.
    pub fn set(&self, new_value: impl Into<Value>) -> Result<()> {
        let new_value = new_value.into();
        match &self.0.kind {
            RefKind::Value {
                raw,
                value,
                shallow,
            } => {
                let direct = *shallow || is_shallow(&new_value) || is_readonly(&new_value);
                let new_raw = if direct {
                    new_value.clone()
                } else {
                    to_raw(&new_value)
                };
                if !has_changed(&new_raw, &raw.borrow()) {
                    return Ok(());
                }
                let working = if direct {
                    new_value
                } else {
                    to_reactive(new_raw.clone())
                };
                let old_raw = raw.replace(new_raw);
                let old_value = value.replace(working);
                drop((old_raw, old_value));
                Runtime::trigger_dep(self.0.dep);
                Ok(())
            }
            RefKind::Property { object, key, .. } => object.set(key.clone(), new_value),
            RefKind::Custom { set, .. } => {
                set(new_value);
                Ok(())
            }
        }
    }

    /// Replace the value with `f(current)`, reading the current value
    /// untracked.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> Result<()> {
        let current = self.get_untracked();
        self.set(f(&current))
    }

    /// Whether this ref stores object payloads without wrapping them.
    pub fn is_shallow(&self) -> bool {
        matches!(self.0.kind, RefKind::Value { shallow: true, .. })
    }

    /// Number of effects subscribed to this ref's own dependency.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dep_subscriber_count(self.0.dep)
    }

    /// Whether both handles refer to the same box.
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.kind {
            RefKind::Value { shallow: false, .. } => "value",
            RefKind::Value { shallow: true, .. } => "shallow",
            RefKind::Property { .. } => "property",
            RefKind::Custom { .. } => "custom",
        };
        f.debug_struct("Ref").field("kind", &kind).finish()
    }
}

/// Create a shallow ref.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    Ref::shallow(value)
}

/// Whether a value is a ref.
pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// The ref's value if `value` is a ref, otherwise `value` itself.
pub fn unref(value: Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other,
    }
}

/// Notify a ref's subscribers without changing it.
pub fn trigger_ref(r: &Ref) {
    Runtime::trigger_dep(r.0.dep);
}

/// A ref bound to one property of `object`.
///
/// If the property currently holds a ref, that ref is returned instead.
pub fn to_ref(object: &Value, key: impl Into<PropKey>) -> Ref {
    property_ref(object, key.into(), None)
}

/// Like [`to_ref`], reading `default` while the property is undefined.
pub fn to_ref_with_default(
    object: &Value,
    key: impl Into<PropKey>,
    default: impl Into<Value>,
) -> Ref {
    property_ref(object, key.into(), Some(default.into()))
}

fn property_ref(object: &Value, key: PropKey, default: Option<Value>) -> Ref {
    if let Value::Ref(existing) = object.get(&key) {
        return existing;
    }
    Ref::from_kind(RefKind::Property {
        object: object.clone(),
        key,
        default,
    })
}

/// A property ref for every own key of `object`. Array `length` is
/// skipped.
pub fn to_refs(object: &Value) -> IndexMap<PropKey, Ref> {
    if !is_proxy(object) {
        warn!("to_refs() expects a reactive object but received a plain one");
    }
    let is_array = object.raw_target().is_some_and(|target| target.is_array());
    object
        .own_keys()
        .into_iter()
        .filter(|key| !(is_array && key.is_length()))
        .map(|key| {
            let r = to_ref(object, key.clone());
            (key, r)
        })
        .collect()
}

/// Hooks handed to a [`custom_ref`] factory.
#[derive(Debug, Clone, Copy)]
pub struct RefHooks {
    dep: DepId,
}

impl RefHooks {
    /// Subscribe the running effect to the ref.
    pub fn track(&self) {
        Runtime::track_dep(self.dep);
    }

    /// Notify the ref's subscribers.
    pub fn trigger(&self) {
        Runtime::trigger_dep(self.dep);
    }
}

/// A ref whose reads and writes are supplied by `factory`, which decides
/// when to call [`RefHooks::track`] and [`RefHooks::trigger`].
pub fn custom_ref<G, S>(factory: impl FnOnce(RefHooks) -> (G, S)) -> Ref
where
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    let dep = Runtime::allocate_dep();
    let (get, set) = factory(RefHooks { dep });
    Ref(Rc::new(RefInner {
        dep,
        kind: RefKind::Custom {
            get: Box::new(get),
            set: Box::new(set),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::proxy::{reactive, readonly};
    use crate::reactive::effect;
    use crate::value::Target;

    #[test]
    fn ref_get_and_set() {
        let r = Ref::new(0);
        assert_eq!(r.get(), Value::from(0));

        r.set(42).unwrap();
        assert_eq!(r.get(), Value::from(42));
    }

    #[test]
    fn ref_update() {
        let r = Ref::new(10);
        r.update(|n| Value::from(n.as_f64().unwrap_or_default() * 2.0))
            .unwrap();
        assert_eq!(r.get(), Value::from(20));
    }

    #[test]
    fn ref_notifies_only_on_change() {
        let r = Ref::new(1);
        let runs = Rc::new(Cell::new(0));
        let runner = effect({
            let r = r.clone();
            let runs = runs.clone();
            move || {
                r.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(r.subscriber_count(), 1);

        r.set(1).unwrap();
        assert_eq!(runs.get(), 1);
        r.set(2).unwrap();
        assert_eq!(runs.get(), 2);

        trigger_ref(&r);
        assert_eq!(runs.get(), 3);
        runner.stop();
    }

    #[test]
    fn signed_zero_counts_as_change() {
        let r = Ref::new(0.0);
        let runs = Rc::new(Cell::new(0));
        let runner = effect({
            let r = r.clone();
            let runs = runs.clone();
            move || {
                r.get();
                runs.set(runs.get() + 1);
            }
        });

        r.set(-0.0).unwrap();
        assert_eq!(runs.get(), 2);
        runner.stop();
    }

    #[test]
    fn object_payloads_are_wrapped_deeply() {
        let obj = Target::object_from([("a", 1)]);
        let r = Ref::new(obj.clone());
        assert!(r.get().is_proxy());
        assert!(to_raw(&r.get()).ptr_eq(&Value::from(obj.clone())));

        let shallow = Ref::shallow(obj);
        assert!(!shallow.get().is_proxy());
        assert!(shallow.is_shallow());
    }

    #[test]
    fn readonly_payload_is_stored_as_is() {
        let ro = readonly(Target::object());
        let r = Ref::new(Value::Undefined);
        r.set(ro.clone()).unwrap();
        assert!(r.get().ptr_eq(&ro));
    }

    #[test]
    fn ref_of_ref_is_identity() {
        let r = Ref::new(1);
        let again = Ref::new(Value::from(r.clone()));
        assert!(again.ptr_eq(&r));
        assert!(is_ref(&Value::from(r.clone())));
        assert_eq!(unref(Value::from(r)), Value::from(1));
        assert_eq!(unref(Value::from(2)), Value::from(2));
    }

    #[test]
    fn property_ref_forwards_to_object() {
        let state = reactive(Target::object_from([("count", 1)]));
        let count = to_ref(&state, "count");

        count.set(5).unwrap();
        assert_eq!(state.get("count"), Value::from(5));

        state.set("count", 6).unwrap();
        assert_eq!(count.get(), Value::from(6));

        let missing = to_ref_with_default(&state, "missing", "fallback");
        assert_eq!(missing.get(), Value::from("fallback"));
    }

    #[test]
    fn to_refs_covers_own_keys() {
        let state = reactive(Target::object_from([("a", 1), ("b", 2)]));
        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[&PropKey::from("b")].get(), Value::from(2));
    }

    #[test]
    fn custom_ref_controls_tracking() {
        let store = Rc::new(RefCell::new(Value::from(1)));
        let r = custom_ref(|hooks| {
            let read = store.clone();
            let write = store.clone();
            (
                move || {
                    hooks.track();
                    read.borrow().clone()
                },
                move |value| {
                    *write.borrow_mut() = value;
                    hooks.trigger();
                },
            )
        });

        let seen = Rc::new(RefCell::new(Value::Undefined));
        let runner = effect({
            let r = r.clone();
            let seen = seen.clone();
            move || *seen.borrow_mut() = r.get()
        });

        r.set(7).unwrap();
        assert_eq!(*seen.borrow(), Value::from(7));
        runner.stop();
    }
}
