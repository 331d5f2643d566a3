//! Error types.
//!
//! Nothing in the engine is fatal. Writes through a readonly handle, writes
//! to a getter-only computed value and operations applied to the wrong kind
//! of target are reported as [`ReactiveError`] values (and logged) while the
//! underlying state is left untouched.

use thiserror::Error;

use crate::value::TargetKind;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Failures reported by reactive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A property write was attempted through a readonly handle.
    #[error("set operation on key \"{key}\" failed: target is readonly")]
    ReadonlyWrite { key: String },

    /// A property delete was attempted through a readonly handle.
    #[error("delete operation on key \"{key}\" failed: target is readonly")]
    ReadonlyDelete { key: String },

    /// A collection mutation was attempted through a readonly handle.
    #[error("{operation} operation failed: target is readonly")]
    ReadonlyCollection { operation: &'static str },

    /// A write was attempted on a computed value without a setter.
    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    /// The operation does not apply to this kind of target.
    #[error("{operation} is not supported on {kind} targets")]
    Unsupported {
        operation: &'static str,
        kind: TargetKind,
    },

    /// An array `length` was set to something other than a valid index.
    #[error("invalid array length")]
    InvalidArrayLength,

    /// Weak collections only accept objects as keys.
    #[error("invalid value used as weak collection key")]
    InvalidWeakKey,

    /// The value is a primitive where an object was required.
    #[error("value is not an object")]
    NotAnObject,

    /// A computed value was read from inside its own getter.
    #[error("computed value read itself while computing")]
    CyclicComputed,

    /// A value graph containing a cycle was converted to JSON.
    #[error("cannot convert cyclic value to JSON")]
    CyclicValue,
}
