//! Property and entry keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::Value;

/// A property key on an object or array target.
///
/// Strings that spell a canonical array index (`"0"`, `"42"`, but not
/// `"007"`) normalize to [`PropKey::Index`], so `"3"` and `3` address the
/// same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    /// An integer index.
    Index(usize),
    /// A named property.
    Name(Rc<str>),
}

impl PropKey {
    /// The array `length` key.
    pub fn length() -> Self {
        PropKey::Name(Rc::from("length"))
    }

    /// Whether this is the `length` key.
    pub fn is_length(&self) -> bool {
        matches!(self, PropKey::Name(name) if &**name == "length")
    }

    /// The index, if this key is an integer index.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropKey::Index(index) => Some(*index),
            PropKey::Name(_) => None,
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(index) => write!(f, "{index}"),
            PropKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        match name.parse::<usize>() {
            Ok(index) if index.to_string() == name => PropKey::Index(index),
            _ => PropKey::Name(Rc::from(name)),
        }
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::from(name.as_str())
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<i32> for PropKey {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => PropKey::Index(index),
            Err(_) => PropKey::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

/// A [`Value`] usable as a Map/Set entry key.
///
/// Equality is SameValueZero: NaN equals NaN, `+0` equals `-0`, strings by
/// content and every object-like value (raw target, proxy, ref) by identity.
/// A proxy and the target it wraps are therefore different keys.
#[derive(Debug, Clone)]
pub struct ValueKey(Value);

impl ValueKey {
    /// Wrap a value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        super::same_value_zero(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                let canonical = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0f64.to_bits()
                } else {
                    n.to_bits()
                };
                canonical.hash(state);
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            other => {
                5u8.hash(state);
                other.identity().hash(state);
            }
        }
    }
}
