//! Dependency Graph
//!
//! This module holds the data structures behind tracking: which effects
//! depend on which keys of which targets.
//!
//! # Overview
//!
//! The graph is bipartite. On one side are dependency sets ([`Dep`]), one
//! per observed `(target, key)` pair plus one per ref or computed value. On
//! the other side are effects. Each dep lists its subscribed effects, and
//! the runtime keeps the reverse list (the deps each effect subscribed to)
//! so that rerunning or stopping an effect can unsubscribe it.
//!
//! # Design Decisions
//!
//! 1. Deps live in one arena and are addressed by [`DepId`]. Effects hold
//!    IDs, never references, so there are no reference cycles between
//!    effects and the state they observe.
//!
//! 2. The target index is keyed by [`TargetId`](crate::value::TargetId).
//!    Dropping a target drops its entries, so observing a target never keeps
//!    it alive.
//!
//! 3. Each dep carries two bitsets of generation markers. A rerunning effect
//!    diffs its old and new dependencies through them instead of clearing
//!    and rebuilding every subscription.

mod dep;
mod key;
mod store;

pub use dep::{Dep, DepId};
pub use key::{DepKey, TrackOp, TriggerOp};
pub use store::DependencyStore;
