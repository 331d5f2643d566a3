//! Interception Layer
//!
//! A [`Proxy`] is a reactive handle over exactly one target. Every read
//! through it is tracked and every write triggers, while the target itself
//! stays a plain container.
//!
//! # Variants
//!
//! Handles come in four [`ProxyKind`]s along two axes:
//!
//! | | mutable | readonly |
//! |---|---|---|
//! | deep | [`reactive`] | [`readonly`] |
//! | shallow | [`shallow_reactive`] | [`shallow_readonly`] |
//!
//! Deep handles wrap object-valued reads in a handle of the same mutability,
//! lazily, on access. Readonly handles never track and reject writes.
//!
//! # Identity
//!
//! Each target caches at most one live handle per kind, keyed by the
//! target's identity, so wrapping the same target twice yields the same
//! handle. Wrapping a handle returns it unchanged, except that a readonly
//! wrapper may be layered over a mutable handle; that layered handle is
//! cached on the inner handle.
//!
//! Handles are cached weakly. Once every clone of a handle is dropped, the
//! next wrap creates a fresh one.

mod array;
mod base;
mod collection;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::value::{Target, Value};

/// The four handle variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl ProxyKind {
    pub fn is_readonly(&self) -> bool {
        matches!(self, ProxyKind::Readonly | ProxyKind::ShallowReadonly)
    }

    pub fn is_shallow(&self) -> bool {
        matches!(self, ProxyKind::ShallowReactive | ProxyKind::ShallowReadonly)
    }

    fn slot(&self) -> usize {
        match self {
            ProxyKind::Reactive => 0,
            ProxyKind::ShallowReactive => 1,
            ProxyKind::Readonly => 2,
            ProxyKind::ShallowReadonly => 3,
        }
    }
}

/// The reserved identity keys every handle answers without tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    IsReactive,
    IsReadonly,
    IsShallow,
    /// The value the handle wraps directly.
    Raw,
}

/// Per-kind weak cache of the handles wrapping one value.
#[derive(Default)]
pub(crate) struct ProxyCache {
    slots: RefCell<[Option<Weak<ProxyInner>>; 4]>,
}

impl ProxyCache {
    fn get(&self, kind: ProxyKind) -> Option<Proxy> {
        self.slots.borrow()[kind.slot()]
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Proxy)
    }

    fn insert(&self, kind: ProxyKind, proxy: &Proxy) {
        self.slots.borrow_mut()[kind.slot()] = Some(Rc::downgrade(&proxy.0));
    }
}

struct ProxyInner {
    /// The wrapped value: a raw target, or a mutable handle under a
    /// readonly one.
    target: Value,
    /// The innermost raw target.
    raw: Target,
    kind: ProxyKind,
    proxies: ProxyCache,
}

/// A reactive handle over one target.
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

impl Proxy {
    /// The handle variant.
    pub fn kind(&self) -> ProxyKind {
        self.0.kind
    }

    pub fn is_readonly(&self) -> bool {
        self.0.kind.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.kind.is_shallow()
    }

    /// The innermost raw target.
    pub fn raw(&self) -> &Target {
        &self.0.raw
    }

    /// The value this handle wraps directly.
    pub fn target(&self) -> &Value {
        &self.0.target
    }

    /// Whether both handles are the same handle.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Answer a reserved identity key. Never tracks.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(!self.is_readonly()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.is_shallow()),
            ReactiveFlag::Raw => self.0.target.clone(),
        }
    }

    /// Wrap a value read through this handle, per its variant.
    fn wrap(&self, value: Value) -> Value {
        if self.is_shallow() {
            value
        } else if self.is_readonly() {
            to_readonly(value)
        } else {
            to_reactive(value)
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.0.kind)
            .field("raw", &self.0.raw)
            .finish()
    }
}

fn create_proxy(value: Value, kind: ProxyKind) -> Value {
    let (raw, cache) = match &value {
        Value::Object(target) => {
            if target.is_skipped() {
                return value.clone();
            }
            (target.clone(), target.proxies())
        }
        Value::Proxy(existing) => {
            if !kind.is_readonly() || existing.is_readonly() {
                return value.clone();
            }
            (existing.raw().clone(), &existing.0.proxies)
        }
        _ => {
            warn!(value_type = value.type_name(), "value cannot be made reactive");
            return value.clone();
        }
    };

    if let Some(existing) = cache.get(kind) {
        return Value::Proxy(existing);
    }
    let proxy = Proxy(Rc::new(ProxyInner {
        target: value.clone(),
        raw,
        kind,
        proxies: ProxyCache::default(),
    }));
    cache.insert(kind, &proxy);
    Value::Proxy(proxy)
}

/// Wrap a target in a deep mutable handle.
///
/// Primitives and refs are returned unchanged with a warning. A target
/// marked with [`mark_raw`] is returned unchanged.
pub fn reactive(value: impl Into<Value>) -> Value {
    create_proxy(value.into(), ProxyKind::Reactive)
}

/// Wrap a target in a mutable handle whose reads are not wrapped.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    create_proxy(value.into(), ProxyKind::ShallowReactive)
}

/// Wrap a target, or a mutable handle, in a deep readonly handle.
pub fn readonly(value: impl Into<Value>) -> Value {
    create_proxy(value.into(), ProxyKind::Readonly)
}

/// Wrap a target in a readonly handle whose reads are not wrapped.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    create_proxy(value.into(), ProxyKind::ShallowReadonly)
}

/// Whether a value is a mutable handle, or a readonly handle layered over
/// one.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) if proxy.is_readonly() => is_reactive(proxy.target()),
        Value::Proxy(_) => true,
        _ => false,
    }
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_readonly())
}

pub fn is_shallow(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_shallow())
}

/// Whether a value is any kind of handle.
pub fn is_proxy(value: &Value) -> bool {
    value.is_proxy()
}

/// The raw target behind any number of handles; other values unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Object(proxy.raw().clone()),
        other => other.clone(),
    }
}

/// Flag a target so that no factory ever wraps it. Returns the value.
pub fn mark_raw(value: Value) -> Value {
    if let Some(target) = value.raw_target() {
        target.mark_skipped();
    }
    value
}

/// Deep mutable handle for containers; other values unchanged.
pub fn to_reactive(value: Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value
    }
}

/// Deep readonly handle for containers; other values unchanged.
pub fn to_readonly(value: Value) -> Value {
    if value.is_object() {
        readonly(value)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_is_idempotent() {
        let obj = Target::object();
        let a = reactive(obj.clone());
        let b = reactive(obj.clone());
        assert!(a.ptr_eq(&b));
        assert!(reactive(a.clone()).ptr_eq(&a));
    }

    #[test]
    fn readonly_layers_over_reactive() {
        let obj = Target::object();
        let r = reactive(obj.clone());
        let ro = readonly(r.clone());

        assert!(!ro.ptr_eq(&r));
        assert!(readonly(r.clone()).ptr_eq(&ro));
        assert!(is_readonly(&ro));
        assert!(is_reactive(&ro));
        assert!(to_raw(&ro).ptr_eq(&Value::from(obj)));
        assert!(ro.flag(ReactiveFlag::Raw).ptr_eq(&r));

        // a readonly handle is never rewrapped
        assert!(readonly(ro.clone()).ptr_eq(&ro));
        assert!(reactive(ro.clone()).ptr_eq(&ro));
    }

    #[test]
    fn kinds_are_cached_separately() {
        let obj = Target::object();
        let deep = reactive(obj.clone());
        let shallow = shallow_reactive(obj.clone());
        let ro = readonly(obj.clone());

        assert!(!deep.ptr_eq(&shallow));
        assert!(!deep.ptr_eq(&ro));
        assert!(is_shallow(&shallow));
        assert!(!is_reactive(&ro));
        assert!(shallow_readonly(obj).flag(ReactiveFlag::IsShallow).is_truthy());
    }

    #[test]
    fn primitives_are_returned_unchanged() {
        let value = reactive(1);
        assert_eq!(value, Value::from(1));
        assert!(!is_proxy(&value));
    }

    #[test]
    fn marked_targets_are_never_wrapped() {
        let obj = mark_raw(Value::from(Target::object()));
        let wrapped = reactive(obj.clone());
        assert!(wrapped.ptr_eq(&obj));
        assert!(!is_proxy(&wrapped));
    }

    #[test]
    fn flags_on_plain_values() {
        let plain = Value::from(Target::object());
        assert_eq!(plain.flag(ReactiveFlag::IsReactive), Value::from(false));
        assert!(plain.flag(ReactiveFlag::Raw).is_undefined());
    }

    #[test]
    fn dropped_handles_are_recreated() {
        let obj = Target::object();
        let first = reactive(obj.clone());
        assert!(obj.proxies().get(ProxyKind::Reactive).is_some());
        drop(first);
        assert!(obj.proxies().get(ProxyKind::Reactive).is_none());

        let second = reactive(obj.clone());
        assert!(is_reactive(&second));
        assert!(obj.proxies().get(ProxyKind::Reactive).is_some());
    }
}
