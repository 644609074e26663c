//! Ordered Sequences
//!
//! Index writes ([`Array::set`]) and length changes ([`Array::set_len`]) are
//! plain storage operations that nobody can intercept. The seven mutating
//! methods (`push`, `pop`, `shift`, `unshift`, `splice`, `sort`, `reverse`)
//! are different: once the array is observed, each call is reported to the
//! installed [`ArrayInterceptor`] after the storage lock is released.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::{Value, MAX_INDEX};
use crate::reactive::{ArrayInterceptor, ArrayMethod, ObserverHandle};

struct ArrayInner {
    items: RwLock<Vec<Value>>,
    observer: OnceLock<ObserverHandle>,
    interceptor: OnceLock<Arc<dyn ArrayInterceptor>>,
}

/// A shared, ordered sequence of values.
#[derive(Clone)]
pub struct Array {
    inner: Arc<ArrayInner>,
}

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                observer: OnceLock::new(),
                interceptor: OnceLock::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or [`Value::Undefined`] past the end.
    pub fn get(&self, index: usize) -> Value {
        self.inner.items.read().get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Plain index write. Grows the array with `Undefined` holes if needed.
    /// Not intercepted; use `set_property` to write an index reactively.
    /// Writes past [`MAX_INDEX`] are ignored.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        if index > MAX_INDEX {
            return;
        }
        let mut items = self.inner.items.write();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
    }

    /// Plain length write. Not intercepted. Lengths are capped at one past
    /// [`MAX_INDEX`].
    pub fn set_len(&self, len: usize) {
        let len = len.min(MAX_INDEX + 1);
        self.inner.items.write().resize(len, Value::Undefined);
    }

    /// Append items, returning the new length.
    pub fn push<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.intercepted(ArrayMethod::Push, inserted, |items, inserted| {
            items.extend(inserted.iter().cloned());
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        self.intercepted(ArrayMethod::Pop, Vec::new(), |items, _| {
            items.pop().unwrap_or_default()
        })
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        self.intercepted(ArrayMethod::Shift, Vec::new(), |items, _| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    /// Prepend items, returning the new length.
    pub fn unshift<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.intercepted(ArrayMethod::Unshift, inserted, |items, inserted| {
            items.splice(0..0, inserted.iter().cloned());
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// A negative `start` counts back from the end. `None` removes everything
    /// from `start` on. Returns the removed elements.
    pub fn splice<I, V>(&self, start: isize, delete_count: Option<usize>, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.intercepted(ArrayMethod::Splice, inserted, |items, inserted| {
            let len = items.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (start as usize).min(len)
            };
            let remaining = len - start;
            let count = delete_count.map_or(remaining, |n| n.min(remaining));
            items
                .splice(start..start + count, inserted.iter().cloned())
                .collect()
        })
    }

    /// Sort in place by the rendered string form of each element, with
    /// `Undefined` last. The sort is stable.
    pub fn sort(&self) {
        self.sort_by(default_order);
    }

    /// Sort in place with a custom comparator. The sort is stable.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        // Comparators may read this array, so sort outside the lock.
        let mut sorted = self.to_vec();
        sorted.sort_by(|a, b| compare(a, b));
        self.intercepted(ArrayMethod::Sort, Vec::new(), |items, _| *items = sorted)
    }

    pub fn reverse(&self) {
        self.intercepted(ArrayMethod::Reverse, Vec::new(), |items, _| items.reverse())
    }

    /// The observer attached to this array, if it has been wrapped.
    pub fn observer(&self) -> Option<ObserverHandle> {
        self.inner.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// See [`Object::attach_observer`](super::Object).
    pub(crate) fn attach_observer(
        &self,
        make: impl FnOnce() -> ObserverHandle,
    ) -> (ObserverHandle, bool) {
        let mut created = false;
        let observer = self
            .inner
            .observer
            .get_or_init(|| {
                created = true;
                make()
            })
            .clone();
        (observer, created)
    }

    /// Route the seven mutating methods through `interceptor` from now on.
    pub(crate) fn augment(&self, interceptor: Arc<dyn ArrayInterceptor>) {
        let _ = self.inner.interceptor.set(interceptor);
    }

    /// Apply `op` to the storage, then report the call to the interceptor.
    fn intercepted<R>(
        &self,
        method: ArrayMethod,
        inserted: Vec<Value>,
        op: impl FnOnce(&mut Vec<Value>, &[Value]) -> R,
    ) -> R {
        let result = {
            let mut items = self.inner.items.write();
            op(&mut items, &inserted)
        };
        if let Some(interceptor) = self.inner.interceptor.get() {
            interceptor.intercept(method, &inserted);
        }
        result
    }
}

fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        // Rendered strings compare by UTF-16 code unit, not by byte.
        (false, false) => a.to_string().encode_utf16().cmp(b.to_string().encode_utf16()),
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len())
            .field("observed", &self.inner.observer.get().is_some())
            .finish()
    }
}
