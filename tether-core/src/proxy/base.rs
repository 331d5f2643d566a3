//! Property traps for object and array targets.
//!
//! Reads track `(target, key)`, enumeration tracks the iteration key, and
//! writes trigger only when they are observable: a new key, a changed value
//! or a deleted key that existed.

use tracing::warn;

use super::{to_raw, Proxy};
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, TrackOp, TriggerOp};
use crate::reactive::{track, trigger};
use crate::value::{has_changed, PropKey, Value};

impl Proxy {
    pub(crate) fn get_trap(&self, key: &PropKey, receiver: &Value) -> Value {
        let raw = self.raw();
        let result = self.target().get_with_receiver(key, receiver);

        // collection targets expose no tracked properties
        if raw.kind().is_collection() {
            return result;
        }

        if !self.is_readonly() {
            track(raw, TrackOp::Get, key.clone());
        }

        if self.is_shallow() {
            return result;
        }

        match result {
            // array slots keep their refs; named properties unwrap them
            Value::Ref(r) if !(raw.is_array() && key.as_index().is_some()) => r.get(),
            other => self.wrap(other),
        }
    }

    pub(crate) fn set_trap(&self, key: PropKey, value: Value, receiver: &Value) -> Result<bool> {
        if self.is_readonly() {
            warn!(key = %key, "set operation failed: target is readonly");
            return Err(ReactiveError::ReadonlyWrite {
                key: key.to_string(),
            });
        }

        let raw = self.raw();
        let mut old = raw.get(&key, &Value::Object(raw.clone()));
        let mut value = value;

        if !self.is_shallow() {
            if !super::is_shallow(&value) && !super::is_readonly(&value) {
                old = to_raw(&old);
                value = to_raw(&value);
            }
            if let Value::Ref(r) = &old {
                if !raw.is_array() && !value.is_ref() {
                    r.set(value)?;
                    return Ok(true);
                }
            }
        }

        let had_key = raw.has_own(&key);
        let result = raw.set(key.clone(), value.clone(), receiver)?;

        // writes forwarded up a prototype chain trigger on the receiver only
        let on_receiver = receiver.raw_target().is_some_and(|r| r.ptr_eq(raw));
        if on_receiver {
            if !had_key {
                trigger(raw, TriggerOp::Add, Some(DepKey::Prop(key)), Some(&value));
            } else if has_changed(&value, &old) {
                trigger(raw, TriggerOp::Set, Some(DepKey::Prop(key)), Some(&value));
            }
        }
        Ok(result)
    }

    pub(crate) fn has_trap(&self, key: &PropKey) -> bool {
        let result = self.target().has(key);
        if !self.is_readonly() {
            track(self.raw(), TrackOp::Has, key.clone());
        }
        result
    }

    pub(crate) fn delete_trap(&self, key: &PropKey) -> Result<bool> {
        if self.is_readonly() {
            warn!(key = %key, "delete operation failed: target is readonly");
            return Err(ReactiveError::ReadonlyDelete {
                key: key.to_string(),
            });
        }

        let raw = self.raw();
        let had_key = raw.has_own(key);
        let result = raw.delete(key)?;
        if result && had_key {
            trigger(raw, TriggerOp::Delete, Some(DepKey::Prop(key.clone())), None);
        }
        Ok(result)
    }

    pub(crate) fn own_keys_trap(&self) -> Vec<PropKey> {
        let raw = self.raw();
        if !self.is_readonly() {
            let key = if raw.is_array() {
                DepKey::Prop(PropKey::length())
            } else {
                DepKey::Iterate
            };
            track(raw, TrackOp::Iterate, key);
        }
        self.target().own_keys()
    }
}
