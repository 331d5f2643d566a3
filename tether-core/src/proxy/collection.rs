//! Map, Set, WeakMap and WeakSet instrumentation.
//!
//! Collections are observed through their methods rather than their
//! properties. Lookups track the entry key, in both its given and its raw
//! form when those differ. Size and iteration track the iteration key,
//! except key-only iteration of a Map, which tracks a separate key so that
//! overwriting a value does not rerun it.
//!
//! Mutations always store raw keys and values and trigger only when they
//! change something. A readonly handle layered over a reactive one reads
//! through the inner handle, so its reads are still tracked.

use tracing::warn;

use super::{to_raw, Proxy};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, TrackOp, TriggerOp};
use crate::reactive::{track, trigger};
use crate::value::{has_changed, same_value, Target, TargetKind, Value, ValueKey};

fn entry_key(key: &Value) -> DepKey {
    DepKey::Entry(ValueKey::new(key.clone()))
}

impl Proxy {
    fn reject(&self, operation: &'static str) -> ReactiveError {
        warn!(operation, kind = %self.raw().kind(), "collection mutation failed: target is readonly");
        ReactiveError::ReadonlyCollection { operation }
    }

    /// Track a lookup of `key` in both its given and its raw form.
    fn track_entry(&self, op: TrackOp, key: &Value, raw_key: &Value) {
        if self.is_readonly() {
            return;
        }
        if !same_value(key, raw_key) {
            track(self.raw(), op, entry_key(key));
        }
        track(self.raw(), op, entry_key(raw_key));
    }

    fn inner(&self) -> Option<&Proxy> {
        self.target().as_proxy()
    }

    fn collection_get(&self, key: &Value) -> Result<Value> {
        let raw = self.raw();
        let raw_key = to_raw(key);
        self.track_entry(TrackOp::Get, key, &raw_key);

        let lookup = |key: &Value| -> Result<Value> {
            match self.inner() {
                Some(inner) => inner.collection_get(key),
                None => Ok(raw.entry_get(key)?.unwrap_or_default()),
            }
        };

        if raw.entry_has(key)? {
            Ok(self.wrap(lookup(key)?))
        } else if raw.entry_has(&raw_key)? {
            Ok(self.wrap(lookup(&raw_key)?))
        } else {
            if self.inner().is_some() {
                lookup(key)?;
            }
            Ok(Value::Undefined)
        }
    }

    fn collection_has(&self, key: &Value) -> Result<bool> {
        let raw_key = to_raw(key);
        self.track_entry(TrackOp::Has, key, &raw_key);

        let has = |key: &Value| match self.inner() {
            Some(inner) => inner.collection_has(key),
            None => self.raw().entry_has(key),
        };
        if same_value(key, &raw_key) {
            has(key)
        } else {
            Ok(has(key)? || has(&raw_key)?)
        }
    }

    fn collection_size(&self) -> Result<usize> {
        let raw = self.raw();
        if !self.is_readonly() {
            track(raw, TrackOp::Iterate, DepKey::Iterate);
        }
        match self.inner() {
            Some(inner) => inner.collection_size(),
            None => raw.entry_count(),
        }
    }

    /// Snapshot of wrapped `(key, value)` pairs, tracking `track_key`.
    fn collection_pairs(&self, track_key: DepKey) -> Result<Vec<(Value, Value)>> {
        let raw = self.raw();
        if raw.kind().is_weak() {
            return Err(ReactiveError::Unsupported {
                operation: "iteration",
                kind: raw.kind(),
            });
        }
        if !self.is_readonly() {
            track(raw, TrackOp::Iterate, track_key.clone());
        }
        let pairs = match self.inner() {
            Some(inner) => inner.collection_pairs(track_key)?,
            None => raw.entry_pairs()?,
        };
        Ok(pairs
            .into_iter()
            .map(|(key, value)| (self.wrap(key), self.wrap(value)))
            .collect())
    }

    fn collection_insert(&self, key: Value, value: Value) -> Result<()> {
        if self.is_readonly() {
            return Err(self.reject("set"));
        }
        let raw = self.raw();
        let value = to_raw(&value);

        let mut key = key;
        let mut had_key = raw.entry_has(&key)?;
        if !had_key {
            key = to_raw(&key);
            had_key = raw.entry_has(&key)?;
        }

        let old = raw.entry_insert(key.clone(), value.clone())?;
        if !had_key {
            trigger(raw, TriggerOp::Add, Some(entry_key(&key)), Some(&value));
        } else if has_changed(&value, &old.unwrap_or_default()) {
            trigger(raw, TriggerOp::Set, Some(entry_key(&key)), Some(&value));
        }
        Ok(())
    }

    fn collection_add(&self, value: Value) -> Result<()> {
        if self.is_readonly() {
            return Err(self.reject("add"));
        }
        let raw = self.raw();
        let value = to_raw(&value);
        if raw.entry_add(value.clone())? {
            trigger(raw, TriggerOp::Add, Some(entry_key(&value)), Some(&value));
        }
        Ok(())
    }

    fn collection_delete(&self, key: Value) -> Result<bool> {
        if self.is_readonly() {
            return Err(self.reject("delete"));
        }
        let raw = self.raw();
        let mut key = key;
        if !raw.entry_has(&key)? {
            key = to_raw(&key);
        }
        let removed = raw.entry_delete(&key)?;
        if removed {
            trigger(raw, TriggerOp::Delete, Some(entry_key(&key)), None);
        }
        Ok(removed)
    }

    fn collection_clear(&self) -> Result<()> {
        if self.is_readonly() {
            return Err(self.reject("clear"));
        }
        let raw = self.raw();
        let had_entries = raw.entry_count()? != 0;
        raw.entry_clear()?;
        if had_entries {
            trigger(raw, TriggerOp::Clear, None, None);
        }
        Ok(())
    }
}

impl Value {
    fn collection_target(&self, operation: &'static str) -> Result<Target> {
        let target = self.raw_target().ok_or(ReactiveError::NotAnObject)?;
        if !target.kind().is_collection() {
            return Err(ReactiveError::Unsupported {
                operation,
                kind: target.kind(),
            });
        }
        Ok(target)
    }

    fn map_target(&self, operation: &'static str) -> Result<Target> {
        let target = self.collection_target(operation)?;
        if !target.kind().is_map_like() {
            return Err(ReactiveError::Unsupported {
                operation,
                kind: target.kind(),
            });
        }
        Ok(target)
    }

    /// Map lookup. Missing keys read as `Undefined`.
    pub fn entry(&self, key: impl Into<Value>) -> Result<Value> {
        let key = key.into();
        let target = self.map_target("get")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_get(&key),
            _ => Ok(target.entry_get(&key)?.unwrap_or_default()),
        }
    }

    /// Map insert.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        let target = self.map_target("set")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_insert(key, value),
            _ => target.entry_insert(key, value).map(drop),
        }
    }

    /// Set insert.
    pub fn add(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let target = self.collection_target("add")?;
        if target.kind().is_map_like() {
            return Err(ReactiveError::Unsupported {
                operation: "add",
                kind: target.kind(),
            });
        }
        match self {
            Value::Proxy(proxy) => proxy.collection_add(value),
            _ => target.entry_add(value).map(drop),
        }
    }

    /// Map or Set membership.
    pub fn contains(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let target = self.collection_target("has")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_has(&key),
            _ => target.entry_has(&key),
        }
    }

    /// Map or Set removal. Returns whether an entry was removed.
    pub fn remove(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let target = self.collection_target("delete")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_delete(key),
            _ => target.entry_delete(&key),
        }
    }

    /// Remove every entry of a Map or Set.
    pub fn clear(&self) -> Result<()> {
        let target = self.collection_target("clear")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_clear(),
            _ => target.entry_clear(),
        }
    }

    /// Entry count of a Map or Set.
    pub fn size(&self) -> Result<usize> {
        let target = self.collection_target("size")?;
        match self {
            Value::Proxy(proxy) => proxy.collection_size(),
            _ => target.entry_count(),
        }
    }

    fn pairs(&self, operation: &'static str, track_key: DepKey) -> Result<Vec<(Value, Value)>> {
        let target = self.collection_target(operation)?;
        match self {
            Value::Proxy(proxy) => proxy.collection_pairs(track_key),
            _ => target.entry_pairs(),
        }
    }

    /// Call `f(value, key)` for every entry, in insertion order. Set entries
    /// pass the member as both arguments.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) -> Result<()> {
        for (key, value) in self.pairs("forEach", DepKey::Iterate)? {
            f(value, key);
        }
        Ok(())
    }

    /// Map keys or Set members, in insertion order.
    pub fn keys(&self) -> Result<Vec<Value>> {
        let track_key = match self.raw_target().map(|target| target.kind()) {
            Some(TargetKind::Map) => DepKey::MapKeyIterate,
            _ => DepKey::Iterate,
        };
        let pairs = self.pairs("keys", track_key)?;
        Ok(pairs.into_iter().map(|(key, _)| key).collect())
    }

    /// Map values or Set members, in insertion order.
    pub fn values(&self) -> Result<Vec<Value>> {
        let pairs = self.pairs("values", DepKey::Iterate)?;
        Ok(pairs.into_iter().map(|(_, value)| value).collect())
    }

    /// `(key, value)` pairs in insertion order. Set entries pair each member
    /// with itself.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        self.pairs("entries", DepKey::Iterate)
    }
}
