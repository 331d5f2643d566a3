//! Dynamic Values
//!
//! The engine observes dynamic, mutable state: objects, arrays and keyed
//! collections whose fields are read and written at runtime. This module
//! defines that data model.
//!
//! # Values
//!
//! A [`Value`] is a cheap-to-clone handle. Primitives are stored inline;
//! containers are shared:
//!
//! - [`Value::Object`] holds a raw [`Target`]. Operations on it are plain,
//!   untracked reads and writes.
//! - [`Value::Proxy`] holds a reactive handle over a target. Operations on it
//!   go through the interception layer, which tracks reads and triggers
//!   writes.
//! - [`Value::Ref`] holds a single-value reactive box.
//!
//! Object-like values compare by identity, never structurally.
//!
//! # Operations
//!
//! Property, array and collection operations are methods on `Value` so that
//! application code never needs to know whether it holds a raw target or a
//! reactive handle. The array and collection operations are defined next to
//! their interception logic in [`crate::proxy`].

mod key;
mod target;

pub use key::{PropKey, ValueKey};
pub use target::{Target, TargetId, TargetKind};

use std::rc::Rc;

use serde::ser::{Error as _, Serialize, Serializer};

use crate::error::{ReactiveError, Result};
use crate::proxy::{Proxy, ReactiveFlag};
use crate::reactive::Ref;

/// A dynamic value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw, unobserved container.
    Object(Target),
    /// A reactive handle over a container.
    Proxy(Proxy),
    /// A single-value reactive box.
    Ref(Ref),
}

/// `Object.is`: `+0` and `-0` differ, NaN equals itself, object-like values
/// compare by identity.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        _ => same_non_number(a, b),
    }
}

/// SameValueZero: like [`same_value`] but `+0` equals `-0`. Used for
/// collection keys and array membership.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => same_non_number(a, b),
    }
}

/// Whether a write of `new` over `old` is an observable change.
pub(crate) fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value(new, old)
}

fn same_non_number(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Proxy(x), Value::Proxy(y)) => x.ptr_eq(y),
        (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Strict equality (`===`): NaN is unequal to itself, `+0 == -0`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(x), Value::Number(y)) => x == y,
            _ => same_non_number(self, other),
        }
    }
}

impl Value {
    /// Whether this is `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a container: a raw target or a reactive handle.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    /// Whether this is a reactive handle.
    pub fn is_proxy(&self) -> bool {
        matches!(self, Value::Proxy(_))
    }

    /// Whether this is a ref box.
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    /// A short name for the value's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) | Value::Proxy(_) => "object",
            Value::Ref(_) => "ref",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref_box(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Whether both values are the same object-like value. Always false for
    /// primitives.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        let identity = self.identity();
        identity != 0 && identity == other.identity()
    }

    /// Pointer identity of object-like values, zero for primitives.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Value::Object(target) => target.identity(),
            Value::Proxy(proxy) => proxy.identity(),
            Value::Ref(r) => r.identity(),
            _ => 0,
        }
    }

    /// The innermost raw target behind this value, if it is a container.
    pub(crate) fn raw_target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Proxy(proxy) => Some(proxy.raw().clone()),
            _ => None,
        }
    }

    pub(crate) fn as_array_length(&self) -> Result<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
                Ok(*n as usize)
            }
            _ => Err(ReactiveError::InvalidArrayLength),
        }
    }

    /// Answer one of the reserved identity flags. Never tracks.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match self {
            Value::Proxy(proxy) => proxy.flag(flag),
            _ => match flag {
                ReactiveFlag::Raw => Value::Undefined,
                _ => Value::Bool(false),
            },
        }
    }

    // ------------------------------------------------------------------
    // Property operations
    // ------------------------------------------------------------------

    /// Read a property. Primitives have no properties and yield `Undefined`.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        self.get_with_receiver(&key, self)
    }

    pub(crate) fn get_with_receiver(&self, key: &PropKey, receiver: &Value) -> Value {
        match self {
            Value::Object(target) => target.get(key, receiver),
            Value::Proxy(proxy) => proxy.get_trap(key, receiver),
            _ => Value::Undefined,
        }
    }

    /// Write a property.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<()> {
        self.set_with_receiver(key.into(), value.into(), self)
            .map(|_| ())
    }

    pub(crate) fn set_with_receiver(
        &self,
        key: PropKey,
        value: Value,
        receiver: &Value,
    ) -> Result<bool> {
        match self {
            Value::Object(target) => target.set(key, value, receiver),
            Value::Proxy(proxy) => proxy.set_trap(key, value, receiver),
            _ => Err(ReactiveError::NotAnObject),
        }
    }

    /// Whether the property exists, including the prototype chain.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        let key = key.into();
        match self {
            Value::Object(target) => target.has(&key),
            Value::Proxy(proxy) => proxy.has_trap(&key),
            _ => false,
        }
    }

    /// Delete an own property.
    pub fn delete(&self, key: impl Into<PropKey>) -> Result<bool> {
        let key = key.into();
        match self {
            Value::Object(target) => target.delete(&key),
            Value::Proxy(proxy) => proxy.delete_trap(&key),
            _ => Err(ReactiveError::NotAnObject),
        }
    }

    /// Own property keys.
    pub fn own_keys(&self) -> Vec<PropKey> {
        match self {
            Value::Object(target) => target.own_keys(),
            Value::Proxy(proxy) => proxy.own_keys_trap(),
            _ => Vec::new(),
        }
    }

    /// The `length` property as a count; zero when absent.
    pub fn len(&self) -> usize {
        self.get(PropKey::length()).as_array_length().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // JSON
    // ------------------------------------------------------------------

    /// Snapshot this value as JSON.
    ///
    /// Reads raw state and never tracks. Maps become arrays of `[key, value]`
    /// pairs and sets become arrays. Fails on cycles and weak collections.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut ancestors = Vec::new();
        to_json_inner(self, &mut ancestors)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn to_json_inner(value: &Value, ancestors: &mut Vec<TargetId>) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    let target = match value {
        Value::Undefined | Value::Null => return Ok(Json::Null),
        Value::Bool(b) => return Ok(Json::Bool(*b)),
        Value::Number(n) => return Ok(number_to_json(*n)),
        Value::String(s) => return Ok(Json::String(s.to_string())),
        Value::Ref(r) => return to_json_inner(&r.get_untracked(), ancestors),
        Value::Object(target) => target.clone(),
        Value::Proxy(proxy) => proxy.raw().clone(),
    };

    if ancestors.contains(&target.id()) {
        return Err(ReactiveError::CyclicValue);
    }
    ancestors.push(target.id());

    let json = match target.kind() {
        TargetKind::Object => {
            let mut map = serde_json::Map::new();
            for key in target.own_keys() {
                let child = target.get_own(&key).unwrap_or_default();
                map.insert(key.to_string(), to_json_inner(&child, ancestors)?);
            }
            Json::Object(map)
        }
        TargetKind::Array => Json::Array(
            target
                .elements()
                .iter()
                .map(|item| to_json_inner(item, ancestors))
                .collect::<Result<_>>()?,
        ),
        TargetKind::Map => Json::Array(
            target
                .entry_pairs()?
                .iter()
                .map(|(k, v)| -> Result<Json> {
                    Ok(Json::Array(vec![
                        to_json_inner(k, ancestors)?,
                        to_json_inner(v, ancestors)?,
                    ]))
                })
                .collect::<Result<_>>()?,
        ),
        TargetKind::Set => Json::Array(
            target
                .entry_pairs()?
                .iter()
                .map(|(v, _)| to_json_inner(v, ancestors))
                .collect::<Result<_>>()?,
        ),
        TargetKind::WeakMap | TargetKind::WeakSet => {
            return Err(ReactiveError::Unsupported {
                operation: "serialization",
                kind: target.kind(),
            })
        }
    };

    ancestors.pop();
    Ok(json)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Object(Target::array(items.into_iter().map(Value::from))),
            Json::Object(map) => Value::Object(Target::object_from(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Undefined)
    }
}
