//! Array instrumentation.
//!
//! Membership searches compare by identity, so a search through a reactive
//! handle must find raw elements even when handed their reactive wrapper.
//! They track every index up to the length, search with the argument as
//! given and, failing that, retry with the argument de-proxied.
//!
//! Length-changing mutators run with tracking paused: they read `length` as
//! part of their own bookkeeping, and an effect that pushes must not come to
//! depend on the length it changes. Their writes still go through the
//! handle, so they trigger normally.

use super::{is_reactive, to_raw};
use crate::error::{ReactiveError, Result};
use crate::graph::TrackOp;
use crate::reactive::{pause_tracking, track};
use crate::value::{same_value_zero, PropKey, Target, Value};

#[derive(Clone, Copy)]
enum Search {
    Includes,
    IndexOf,
    LastIndexOf,
}

impl Search {
    fn position(self, items: &[Value], needle: &Value) -> Option<usize> {
        match self {
            Search::Includes => items.iter().position(|item| same_value_zero(item, needle)),
            Search::IndexOf => items.iter().position(|item| item == needle),
            Search::LastIndexOf => items.iter().rposition(|item| item == needle),
        }
    }
}

impl Value {
    fn array_target(&self, operation: &'static str) -> Result<Target> {
        let target = self.raw_target().ok_or(ReactiveError::NotAnObject)?;
        if !target.is_array() {
            return Err(ReactiveError::Unsupported {
                operation,
                kind: target.kind(),
            });
        }
        Ok(target)
    }

    fn search(&self, needle: Value, search: Search) -> Option<usize> {
        let target = self.raw_target().filter(Target::is_array)?;

        if is_reactive(self) {
            track(&target, TrackOp::Get, PropKey::length());
            for index in 0..target.len() {
                track(&target, TrackOp::Get, PropKey::Index(index));
            }
        }

        let items = target.elements();
        search.position(&items, &needle).or_else(|| {
            if needle.is_proxy() {
                search.position(&items, &to_raw(&needle))
            } else {
                None
            }
        })
    }

    /// Whether the array contains `needle` (SameValueZero, so NaN is found).
    /// Non-arrays contain nothing.
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        self.search(needle.into(), Search::Includes).is_some()
    }

    /// First index holding `needle` by strict equality.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        self.search(needle.into(), Search::IndexOf)
    }

    /// Last index holding `needle` by strict equality.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        self.search(needle.into(), Search::LastIndexOf)
    }

    fn mutate<R>(&self, operation: &'static str, f: impl FnOnce(&Value) -> Result<R>) -> Result<R> {
        self.array_target(operation)?;
        let _paused = self.is_proxy().then(pause_tracking);
        f(self)
    }

    /// Append items. Returns the new length.
    pub fn push<I, V>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate("push", |this| {
            let len = this.len();
            let count = items.len();
            for (offset, item) in items.into_iter().enumerate() {
                this.set(len + offset, item)?;
            }
            this.set(PropKey::length(), len + count)?;
            Ok(len + count)
        })
    }

    /// Remove and return the last element; `Undefined` when empty.
    pub fn pop(&self) -> Result<Value> {
        self.mutate("pop", |this| {
            let len = this.len();
            if len == 0 {
                this.set(PropKey::length(), 0)?;
                return Ok(Value::Undefined);
            }
            let last = len - 1;
            let item = this.get(last);
            this.delete(last)?;
            this.set(PropKey::length(), last)?;
            Ok(item)
        })
    }

    /// Remove and return the first element; `Undefined` when empty.
    pub fn shift(&self) -> Result<Value> {
        self.mutate("shift", |this| {
            let len = this.len();
            if len == 0 {
                this.set(PropKey::length(), 0)?;
                return Ok(Value::Undefined);
            }
            let first = this.get(0usize);
            for index in 1..len {
                let item = this.get(index);
                this.set(index - 1, item)?;
            }
            this.delete(len - 1)?;
            this.set(PropKey::length(), len - 1)?;
            Ok(first)
        })
    }

    /// Prepend items. Returns the new length.
    pub fn unshift<I, V>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate("unshift", |this| {
            let len = this.len();
            let count = items.len();
            if count > 0 {
                for index in (0..len).rev() {
                    let item = this.get(index);
                    this.set(index + count, item)?;
                }
                for (index, item) in items.into_iter().enumerate() {
                    this.set(index, item)?;
                }
            }
            this.set(PropKey::length(), len + count)?;
            Ok(len + count)
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. A negative `start` counts from the end; a missing
    /// `delete_count` removes everything from `start`. Returns the removed
    /// elements.
    pub fn splice<I, V>(&self, start: isize, delete_count: Option<usize>, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.mutate("splice", |this| {
            let len = this.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                start.unsigned_abs().min(len)
            };
            let delete_count = delete_count.map_or(len - start, |count| count.min(len - start));
            let count = items.len();

            let removed: Vec<Value> = (start..start + delete_count)
                .map(|index| this.get(index))
                .collect();

            if count < delete_count {
                for index in start..len - delete_count {
                    let item = this.get(index + delete_count);
                    this.set(index + count, item)?;
                }
                for index in (len - delete_count + count..len).rev() {
                    this.delete(index)?;
                }
            } else if count > delete_count {
                for index in (start..len - delete_count).rev() {
                    let item = this.get(index + delete_count);
                    this.set(index + count, item)?;
                }
            }
            for (offset, item) in items.into_iter().enumerate() {
                this.set(start + offset, item)?;
            }

            this.set(PropKey::length(), len - delete_count + count)?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::error::ReactiveError;
    use crate::proxy::{reactive, readonly};
    use crate::reactive::effect;
    use crate::value::{Target, Value};

    fn numbers(value: &Value) -> Vec<f64> {
        value
            .to_json()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn membership_finds_raw_elements_through_wrappers() {
        let item = Target::object();
        let list = reactive(Target::array([item.clone()]));

        assert!(list.includes(item.clone()));
        assert!(list.includes(reactive(item.clone())));
        assert_eq!(list.index_of(reactive(item.clone())), Some(0));
        assert!(list.includes(list.get(0)));
        assert!(!list.includes(Target::object()));
    }

    #[test]
    fn search_semantics() {
        let list = Value::from(Target::array([f64::NAN, 1.0, 2.0, 1.0]));
        assert!(list.includes(f64::NAN));
        assert_eq!(list.index_of(f64::NAN), None);
        assert_eq!(list.index_of(1), Some(1));
        assert_eq!(list.last_index_of(1), Some(3));
        assert!(!Value::from(Target::object()).includes(1));
    }

    #[test]
    fn membership_tracks_every_index() {
        let list = reactive(Target::array([1, 2, 3]));
        let found = Rc::new(Cell::new(false));
        let runner = effect({
            let list = list.clone();
            let found = found.clone();
            move || found.set(list.includes(9))
        });
        assert!(!found.get());

        list.set(2, 9).unwrap();
        assert!(found.get());
        runner.stop();
    }

    #[test]
    fn push_notifies_length_readers_once() {
        let list = reactive(Target::array([1]));
        let runs = Rc::new(Cell::new(0));
        let runner = effect({
            let list = list.clone();
            let runs = runs.clone();
            move || {
                list.len();
                runs.set(runs.get() + 1);
            }
        });

        assert_eq!(list.push([2]).unwrap(), 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(numbers(&list), vec![1.0, 2.0]);
        runner.stop();
    }

    #[test]
    fn pushing_effects_do_not_loop() {
        let list = reactive(Target::array(Vec::<Value>::new()));
        let first = effect({
            let list = list.clone();
            move || {
                list.push([1]).unwrap();
            }
        });
        let second = effect({
            let list = list.clone();
            move || {
                list.push([2]).unwrap();
            }
        });

        assert_eq!(numbers(&list), vec![1.0, 2.0]);
        first.stop();
        second.stop();
    }

    #[test]
    fn pop_and_shift() {
        let list = reactive(Target::array([1, 2, 3]));
        assert_eq!(list.pop().unwrap(), Value::from(3));
        assert_eq!(list.shift().unwrap(), Value::from(1));
        assert_eq!(numbers(&list), vec![2.0]);

        let empty = reactive(Target::array(Vec::<Value>::new()));
        assert!(empty.pop().unwrap().is_undefined());
        assert!(empty.shift().unwrap().is_undefined());
    }

    #[test]
    fn unshift_prepends() {
        let list = reactive(Target::array([3]));
        assert_eq!(list.unshift([1, 2]).unwrap(), 3);
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let list = reactive(Target::array([1, 2, 3, 4, 5]));

        let removed = list.splice(1, Some(2), [9]).unwrap();
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(numbers(&list), vec![1.0, 9.0, 4.0, 5.0]);

        let removed = list.splice(-1, None, Vec::<Value>::new()).unwrap();
        assert_eq!(removed, vec![Value::from(5)]);

        list.splice(1, Some(0), [7, 8]).unwrap();
        assert_eq!(numbers(&list), vec![1.0, 7.0, 8.0, 9.0, 4.0]);
    }

    #[test]
    fn shrinking_notifies_readers_of_removed_slots() {
        let list = reactive(Target::array([1, 2, 3]));
        let last = Rc::new(Cell::new(0.0));
        let runner = effect({
            let list = list.clone();
            let last = last.clone();
            move || last.set(list.get(2).as_f64().unwrap_or(-1.0))
        });
        assert_eq!(last.get(), 3.0);

        list.pop().unwrap();
        assert_eq!(last.get(), -1.0);
        runner.stop();
    }

    #[test]
    fn readonly_arrays_reject_mutators() {
        let list = readonly(Target::array([1]));
        assert!(matches!(
            list.push([2]),
            Err(ReactiveError::ReadonlyWrite { .. })
        ));
        assert!(list.includes(1));
    }

    #[test]
    fn mutators_require_arrays() {
        let obj = reactive(Target::object());
        assert!(matches!(
            obj.push([1]),
            Err(ReactiveError::Unsupported { operation: "push", .. })
        ));
        assert_eq!(Value::from(1).pop(), Err(ReactiveError::NotAnObject));
    }
}
