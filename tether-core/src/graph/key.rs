//! Dependency keys and operation kinds.

use std::fmt;

use crate::value::{PropKey, ValueKey};

/// Which dependency of a target a read or write concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A property of an object or array.
    Prop(PropKey),
    /// An entry key of a Map, Set, WeakMap or WeakSet.
    Entry(ValueKey),
    /// Structural enumeration: key lists, sizes and entry iteration.
    Iterate,
    /// Key-only enumeration of a Map, which ignores value changes.
    MapKeyIterate,
}

impl From<PropKey> for DepKey {
    fn from(key: PropKey) -> Self {
        DepKey::Prop(key)
    }
}

impl From<ValueKey> for DepKey {
    fn from(key: ValueKey) -> Self {
        DepKey::Entry(key)
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(key) => write!(f, "{key}"),
            DepKey::Entry(key) => write!(f, "entry({})", key.value().type_name()),
            DepKey::Iterate => f.write_str("<iterate>"),
            DepKey::MapKeyIterate => f.write_str("<map-key-iterate>"),
        }
    }
}

/// Kind of read recorded by `track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write announced by `trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key changed value.
    Set,
    /// A new key appeared.
    Add,
    /// A key was removed.
    Delete,
    /// Every entry of a collection was removed.
    Clear,
}
