//! Raw Targets
//!
//! A [`Target`] is a plain mutable container owned by application code: an
//! object, array, map, set, weak map or weak set. Targets know nothing about
//! tracking. Every operation here is a raw, untracked read or write; the
//! interception layer in [`crate::proxy`] builds tracking on top of them.
//!
//! Each target carries a process-unique [`TargetId`] which keys its entries
//! in the dependency store. Dropping the last handle to a target discards
//! those entries.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::{PropKey, Value, ValueKey};
use crate::error::{ReactiveError, Result};
use crate::proxy::ProxyCache;
use crate::reactive::Runtime;

/// Counter for generating unique target IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a raw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// The kind of container a target holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    /// Map, Set, WeakMap or WeakSet.
    pub fn is_collection(&self) -> bool {
        !matches!(self, TargetKind::Object | TargetKind::Array)
    }

    /// Map or WeakMap.
    pub fn is_map_like(&self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::WeakMap)
    }

    /// WeakMap or WeakSet.
    pub fn is_weak(&self) -> bool {
        matches!(self, TargetKind::WeakMap | TargetKind::WeakSet)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Object => "Object",
            TargetKind::Array => "Array",
            TargetKind::Map => "Map",
            TargetKind::Set => "Set",
            TargetKind::WeakMap => "WeakMap",
            TargetKind::WeakSet => "WeakSet",
        };
        f.write_str(name)
    }
}

enum TargetData {
    Object(IndexMap<PropKey, Value>),
    Array(Vec<Value>),
    Map(IndexMap<ValueKey, Value>),
    Set(IndexSet<ValueKey>),
    WeakMap(IndexMap<ValueKey, Value>),
    WeakSet(IndexSet<ValueKey>),
}

impl TargetData {
    fn kind(&self) -> TargetKind {
        match self {
            TargetData::Object(_) => TargetKind::Object,
            TargetData::Array(_) => TargetKind::Array,
            TargetData::Map(_) => TargetKind::Map,
            TargetData::Set(_) => TargetKind::Set,
            TargetData::WeakMap(_) => TargetKind::WeakMap,
            TargetData::WeakSet(_) => TargetKind::WeakSet,
        }
    }
}

struct TargetCell {
    id: TargetId,
    kind: TargetKind,
    data: RefCell<TargetData>,
    proto: RefCell<Option<Value>>,
    skip: Cell<bool>,
    proxies: ProxyCache,
}

impl Drop for TargetCell {
    fn drop(&mut self) {
        Runtime::forget_target(self.id);
    }
}

/// A shared handle to a raw container.
///
/// Cloning the handle does not copy the container; identity comparisons
/// ([`Target::ptr_eq`]) and the dependency store both key on the container.
#[derive(Clone)]
pub struct Target(Rc<TargetCell>);

impl Target {
    fn from_data(data: TargetData) -> Self {
        Self(Rc::new(TargetCell {
            id: TargetId::next(),
            kind: data.kind(),
            data: RefCell::new(data),
            proto: RefCell::new(None),
            skip: Cell::new(false),
            proxies: ProxyCache::default(),
        }))
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::from_data(TargetData::Object(IndexMap::new()))
    }

    /// Create an object from key/value pairs.
    pub fn object_from<K, V, I>(entries: I) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_data(TargetData::Object(map))
    }

    /// Create an array.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::from_data(TargetData::Array(items.into_iter().map(Into::into).collect()))
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Self::from_data(TargetData::Map(IndexMap::new()))
    }

    /// Create a map from key/value pairs.
    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (ValueKey::new(k.into()), v.into()))
            .collect();
        Self::from_data(TargetData::Map(map))
    }

    /// Create an empty set.
    pub fn empty_set() -> Self {
        Self::from_data(TargetData::Set(IndexSet::new()))
    }

    /// Create a set from values.
    pub fn set_from<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let set = values
            .into_iter()
            .map(|v| ValueKey::new(v.into()))
            .collect();
        Self::from_data(TargetData::Set(set))
    }

    /// Create an empty weak map.
    pub fn weak_map() -> Self {
        Self::from_data(TargetData::WeakMap(IndexMap::new()))
    }

    /// Create an empty weak set.
    pub fn weak_set() -> Self {
        Self::from_data(TargetData::WeakSet(IndexSet::new()))
    }

    /// Get the target's unique ID.
    pub fn id(&self) -> TargetId {
        self.0.id
    }

    /// Get the container kind.
    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    /// Whether this target is an array.
    pub fn is_array(&self) -> bool {
        self.0.kind == TargetKind::Array
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn proxies(&self) -> &ProxyCache {
        &self.0.proxies
    }

    pub(crate) fn is_skipped(&self) -> bool {
        self.0.skip.get()
    }

    pub(crate) fn mark_skipped(&self) {
        self.0.skip.set(true);
    }

    /// The prototype consulted for keys this object does not own.
    pub fn proto(&self) -> Option<Value> {
        self.0.proto.borrow().clone()
    }

    /// Replace the prototype.
    pub fn set_proto(&self, proto: Option<Value>) {
        let previous = self.0.proto.replace(proto);
        drop(previous);
    }

    fn unsupported(&self, operation: &'static str) -> ReactiveError {
        ReactiveError::Unsupported {
            operation,
            kind: self.kind(),
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read an own property.
    pub fn get_own(&self, key: &PropKey) -> Option<Value> {
        match &*self.0.data.borrow() {
            TargetData::Object(map) => map.get(key).cloned(),
            TargetData::Array(items) => match key {
                PropKey::Index(index) => items.get(*index).cloned(),
                key if key.is_length() => Some(Value::Number(items.len() as f64)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether the target owns a property.
    pub fn has_own(&self, key: &PropKey) -> bool {
        match &*self.0.data.borrow() {
            TargetData::Object(map) => map.contains_key(key),
            TargetData::Array(items) => match key {
                PropKey::Index(index) => *index < items.len(),
                key => key.is_length(),
            },
            _ => false,
        }
    }

    /// Ordinary property read: own slot first, then the prototype chain with
    /// the original receiver.
    pub(crate) fn get(&self, key: &PropKey, receiver: &Value) -> Value {
        if let Some(value) = self.get_own(key) {
            return value;
        }
        match self.proto() {
            Some(proto) => proto.get_with_receiver(key, receiver),
            None => Value::Undefined,
        }
    }

    /// Ordinary `in` check including the prototype chain.
    pub(crate) fn has(&self, key: &PropKey) -> bool {
        if self.has_own(key) {
            return true;
        }
        self.proto().is_some_and(|proto| proto.has(key))
    }

    /// Ordinary property write.
    ///
    /// A key the target does not own is forwarded to the prototype with the
    /// original receiver. The value always lands on the receiver's raw
    /// target, never on a prototype.
    pub(crate) fn set(&self, key: PropKey, value: Value, receiver: &Value) -> Result<bool> {
        if !self.has_own(&key) {
            if let Some(proto) = self.proto() {
                return proto.set_with_receiver(key, value, receiver);
            }
        }
        let destination = receiver.raw_target().unwrap_or_else(|| self.clone());
        destination.define(key, value)?;
        Ok(true)
    }

    /// Write an own property, creating it if needed.
    ///
    /// Writing past the end of an array pads it with `Undefined`; writing
    /// `length` truncates or pads.
    pub fn define(&self, key: PropKey, value: Value) -> Result<()> {
        let displaced: Vec<Value> = {
            let mut data = self.0.data.borrow_mut();
            match &mut *data {
                TargetData::Object(map) => map.insert(key, value).into_iter().collect(),
                TargetData::Array(items) => match key {
                    PropKey::Index(index) => {
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        }
                        vec![std::mem::replace(&mut items[index], value)]
                    }
                    key if key.is_length() => {
                        let length = value.as_array_length()?;
                        if length < items.len() {
                            items.split_off(length)
                        } else {
                            items.resize(length, Value::Undefined);
                            Vec::new()
                        }
                    }
                    _ => return Err(self.unsupported("named property write")),
                },
                _ => return Err(self.unsupported("property write")),
            }
        };
        drop(displaced);
        Ok(())
    }

    /// Remove an own property.
    ///
    /// Array slots are reset to `Undefined` rather than leaving holes; the
    /// array `length` cannot be deleted.
    pub fn delete(&self, key: &PropKey) -> Result<bool> {
        let removed = {
            let mut data = self.0.data.borrow_mut();
            match &mut *data {
                TargetData::Object(map) => map.shift_remove(key),
                TargetData::Array(items) => match key {
                    PropKey::Index(index) if *index < items.len() => {
                        Some(std::mem::take(&mut items[*index]))
                    }
                    PropKey::Index(_) => None,
                    _ if key.is_length() => return Ok(false),
                    _ => None,
                },
                _ => return Err(self.unsupported("property delete")),
            }
        };
        drop(removed);
        Ok(true)
    }

    /// Own property keys in order: indices then `length` for arrays,
    /// insertion order for objects.
    pub fn own_keys(&self) -> Vec<PropKey> {
        match &*self.0.data.borrow() {
            TargetData::Object(map) => map.keys().cloned().collect(),
            TargetData::Array(items) => (0..items.len())
                .map(PropKey::Index)
                .chain(std::iter::once(PropKey::length()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of array elements; zero for other kinds.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            TargetData::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// Whether the array is empty (or the target is not an array).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the array elements.
    pub(crate) fn elements(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            TargetData::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collection entries
    // ------------------------------------------------------------------

    fn check_weak_key(&self, key: &Value) -> Result<()> {
        if self.kind().is_weak() && !key.is_object() {
            return Err(ReactiveError::InvalidWeakKey);
        }
        Ok(())
    }

    /// Map lookup.
    pub(crate) fn entry_get(&self, key: &Value) -> Result<Option<Value>> {
        let key = ValueKey::new(key.clone());
        match &*self.0.data.borrow() {
            TargetData::Map(map) | TargetData::WeakMap(map) => Ok(map.get(&key).cloned()),
            _ => Err(self.unsupported("get")),
        }
    }

    /// Map/Set membership.
    pub(crate) fn entry_has(&self, key: &Value) -> Result<bool> {
        let key = ValueKey::new(key.clone());
        match &*self.0.data.borrow() {
            TargetData::Map(map) | TargetData::WeakMap(map) => Ok(map.contains_key(&key)),
            TargetData::Set(set) | TargetData::WeakSet(set) => Ok(set.contains(&key)),
            _ => Err(self.unsupported("has")),
        }
    }

    /// Map insert. Returns the displaced value.
    pub(crate) fn entry_insert(&self, key: Value, value: Value) -> Result<Option<Value>> {
        self.check_weak_key(&key)?;
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            TargetData::Map(map) | TargetData::WeakMap(map) => {
                Ok(map.insert(ValueKey::new(key), value))
            }
            _ => Err(self.unsupported("set")),
        }
    }

    /// Set insert. Returns whether the value was new.
    pub(crate) fn entry_add(&self, value: Value) -> Result<bool> {
        self.check_weak_key(&value)?;
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            TargetData::Set(set) | TargetData::WeakSet(set) => Ok(set.insert(ValueKey::new(value))),
            _ => Err(self.unsupported("add")),
        }
    }

    /// Map/Set removal. Returns whether an entry was removed.
    pub(crate) fn entry_delete(&self, key: &Value) -> Result<bool> {
        let key = ValueKey::new(key.clone());
        let removed = {
            let mut data = self.0.data.borrow_mut();
            match &mut *data {
                TargetData::Map(map) | TargetData::WeakMap(map) => {
                    map.shift_remove_entry(&key).map(|(k, v)| (k, Some(v)))
                }
                TargetData::Set(set) | TargetData::WeakSet(set) => {
                    set.shift_take(&key).map(|k| (k, None))
                }
                _ => return Err(self.unsupported("delete")),
            }
        };
        Ok(removed.is_some())
    }

    /// Remove every entry of a Map or Set.
    pub(crate) fn entry_clear(&self) -> Result<()> {
        let removed = {
            let mut data = self.0.data.borrow_mut();
            match &mut *data {
                TargetData::Map(map) => (std::mem::take(map), IndexSet::new()),
                TargetData::Set(set) => (IndexMap::new(), std::mem::take(set)),
                _ => return Err(self.unsupported("clear")),
            }
        };
        drop(removed);
        Ok(())
    }

    /// Entry count of a Map or Set.
    pub(crate) fn entry_count(&self) -> Result<usize> {
        match &*self.0.data.borrow() {
            TargetData::Map(map) => Ok(map.len()),
            TargetData::Set(set) => Ok(set.len()),
            _ => Err(self.unsupported("size")),
        }
    }

    /// Snapshot of `(key, value)` pairs in insertion order. Set entries
    /// pair each value with itself.
    pub(crate) fn entry_pairs(&self) -> Result<Vec<(Value, Value)>> {
        match &*self.0.data.borrow() {
            TargetData::Map(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.value().clone(), v.clone()))
                .collect()),
            TargetData::Set(set) => Ok(set
                .iter()
                .map(|k| (k.value().clone(), k.value().clone()))
                .collect()),
            _ => Err(self.unsupported("iteration")),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
