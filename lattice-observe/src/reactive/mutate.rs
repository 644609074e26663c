//! Imperative Set/Delete
//!
//! Adding a key to an object, deleting one, or writing an array index are
//! mutations no accessor can see. [`set_property`] and [`delete_property`]
//! perform them explicitly and notify the right dep.

use super::observer::ObserverHandle;
use super::property::{define_reactive, DefineOptions};
use crate::error::{self, MutationKind, ReactiveError};
use crate::value::{Array, Key, Object, Value};

/// Set `key` on `target`, making a new key reactive if `target` is observed.
///
/// Returns the assigned value. Never fails: misuse is reported as a
/// diagnostic and the call becomes a no-op.
pub fn set_property(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
    let key = key.into();
    let value = value.into();

    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => set_index(arr, index, value.clone()),
            None => error::warn(ReactiveError::NonIndexKey {
                key: key.to_string(),
            }),
        },
        Value::Object(obj) => set_key(obj, &key.as_name(), value.clone()),
        other => error::warn(ReactiveError::InvalidTarget {
            op: MutationKind::Set,
            found: other.to_string(),
        }),
    }
    value
}

fn set_index(arr: &Array, index: usize, value: Value) {
    if index > arr.len() {
        arr.set_len(index);
    }
    arr.splice(to_start(index), Some(1), [value]);
}

fn set_key(obj: &Object, key: &str, value: Value) {
    if obj.has_own(key) {
        obj.set(key, value);
        return;
    }

    let observer = obj.observer();
    if is_guarded(obj, observer.as_ref()) {
        error::warn(ReactiveError::RootMutation {
            op: MutationKind::Set,
            key: key.to_string(),
        });
        return;
    }

    let Some(observer) = observer else {
        obj.set(key, value);
        return;
    };
    define_reactive(obj, key, Some(value), DefineOptions::default());
    observer.dep().notify();
}

/// Delete `key` from `target`, notifying subscribers if `target` is observed.
pub fn delete_property(target: &Value, key: impl Into<Key>) {
    let key = key.into();

    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => {
                arr.splice(to_start(index), Some(1), std::iter::empty::<Value>());
            }
            None => error::warn(ReactiveError::NonIndexKey {
                key: key.to_string(),
            }),
        },
        Value::Object(obj) => delete_key(obj, &key.as_name()),
        other => error::warn(ReactiveError::InvalidTarget {
            op: MutationKind::Delete,
            found: other.to_string(),
        }),
    }
}

fn delete_key(obj: &Object, key: &str) {
    let observer = obj.observer();
    if is_guarded(obj, observer.as_ref()) {
        error::warn(ReactiveError::RootMutation {
            op: MutationKind::Delete,
            key: key.to_string(),
        });
        return;
    }
    if !obj.remove(key) {
        return;
    }
    if let Some(observer) = observer {
        observer.dep().notify();
    }
}

/// Internal instances and root state must declare their keys upfront.
fn is_guarded(obj: &Object, observer: Option<&ObserverHandle>) -> bool {
    obj.is_internal() || observer.is_some_and(|ob| ob.is_root())
}

fn to_start(index: usize) -> isize {
    isize::try_from(index).unwrap_or(isize::MAX)
}
