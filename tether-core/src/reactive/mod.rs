//! Reactive Primitives
//!
//! This module implements the core reactive system: effects, computed
//! values and refs, plus the runtime that connects them to the dependency
//! graph.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a computation that reruns whenever state it read changes.
//! Reads are recorded automatically while the effect runs; there is no
//! dependency list to maintain by hand.
//!
//! ## Computed Values
//!
//! A computed value caches the result of a getter. It recomputes only when
//! read after one of its dependencies changed, and it can itself be read by
//! effects and other computed values.
//!
//! ## Refs
//!
//! A ref is a box around one value, primitives included. Reading the box is
//! tracked and writing a different value notifies the readers.
//!
//! # Implementation Notes
//!
//! The runtime keeps a thread-local stack of running effects. A read
//! through a reactive handle, ref or computed value attributes itself to the
//! innermost entry of that stack.

mod computed;
mod context;
mod effect;
mod reference;
mod runtime;
mod subscriber;

pub use computed::{computed, Computed, ComputedState};
pub use context::{enable_tracking, pause_tracking, untracked, ReactiveContext, TrackingGuard};
pub use effect::{effect, effect_with, stop, EffectOptions, ReactiveEffect, WeakEffect};
pub use reference::{
    custom_ref, is_ref, shallow_ref, to_ref, to_ref_with_default, to_refs, trigger_ref, unref,
    Ref, RefHooks,
};
pub use runtime::{track, trigger, Runtime, MAX_MARKER_BITS};
pub use subscriber::{EffectId, Subscriber};
