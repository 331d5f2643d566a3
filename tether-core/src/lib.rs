//! Tether Core
//!
//! This crate provides fine-grained dependency tracking for dynamic state.
//! It implements:
//!
//! - Effects that rerun when the state they read changes
//! - Reactive handles over objects, arrays and keyed collections
//! - Lazily recomputed computed values and single-value refs
//!
//! Dependencies are discovered at runtime by observing reads, so there is
//! no dependency list to declare or keep in sync.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic data model observed by the engine
//! - `graph`: the dependency store mapping `(target, key)` to subscribers
//! - `reactive`: effects, computed values, refs and the runtime that tracks
//!   and triggers them
//! - `proxy`: the interception layer turning reads into tracking and writes
//!   into notifications
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tether_core::{effect, reactive, Target, Value};
//!
//! let state = reactive(Target::object_from([("count", 0)]));
//! let seen = Rc::new(Cell::new(0.0));
//!
//! let runner = effect({
//!     let state = state.clone();
//!     let seen = seen.clone();
//!     move || seen.set(state.get("count").as_f64().unwrap_or_default())
//! });
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(seen.get(), 5.0);
//!
//! runner.stop();
//! state.set("count", 6).unwrap();
//! assert_eq!(seen.get(), 5.0);
//! assert_eq!(state.get("count"), Value::from(6));
//! ```

pub mod error;
pub mod graph;
pub mod proxy;
pub mod reactive;
pub mod value;

pub use error::{ReactiveError, Result};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, Proxy, ProxyKind,
    ReactiveFlag,
};
pub use reactive::{
    computed, custom_ref, effect, effect_with, enable_tracking, is_ref, pause_tracking,
    shallow_ref, stop, to_ref, to_ref_with_default, to_refs, trigger_ref, unref, untracked,
    Computed, ComputedState, EffectOptions, ReactiveEffect, Ref,
};
pub use value::{same_value, same_value_zero, PropKey, Target, TargetKind, Value};
