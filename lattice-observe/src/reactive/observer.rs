//! Observer
//!
//! An [`Observer`] is attached to every wrapped container. It owns the
//! container-level [`Dep`] (notified when keys are added or removed, or when
//! a sequence is mutated through one of its seven intercepted methods) and
//! the root-data counter.
//!
//! # Wrapping
//!
//! [`observe`] is idempotent: the observer is stored as a hidden marker on
//! the container itself, so a second call returns the same handle. The
//! marker is attached before the container's contents are walked, which is
//! what lets self-referential graphs terminate.
//!
//! Keyed mappings get a reactive accessor per own enumerable key. Sequences
//! get the observer installed as their [`ArrayInterceptor`], and each
//! composite element is observed in turn.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::array::ArrayInterceptor;
use super::dep::Dep;
use super::property::{define_reactive, DefineOptions};
use crate::value::{Array, Object, Value};

/// Shared handle to an observer.
pub type ObserverHandle = Arc<Observer>;

thread_local! {
    static OBSERVING: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable wrapping of not-yet-observed values.
///
/// Already-observed values keep returning their existing observer.
pub fn set_observation_enabled(enabled: bool) {
    OBSERVING.with(|flag| flag.set(enabled));
}

pub fn observation_enabled() -> bool {
    OBSERVING.with(Cell::get)
}

/// Guard that disables observation until dropped, then restores the
/// previous setting.
pub struct ObservationPaused {
    previous: bool,
    _not_send: PhantomData<*const ()>,
}

impl ObservationPaused {
    pub fn new() -> Self {
        let previous = observation_enabled();
        set_observation_enabled(false);
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Default for ObservationPaused {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObservationPaused {
    fn drop(&mut self) {
        set_observation_enabled(self.previous);
    }
}

/// Which kind of container an observer wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedKind {
    Object,
    Array,
}

pub struct Observer {
    dep: Arc<Dep>,
    kind: ObservedKind,
    /// How many owners adopted this value as their root state.
    root_count: AtomicUsize,
}

impl Observer {
    fn new(kind: ObservedKind) -> Self {
        Self {
            dep: Arc::new(Dep::new()),
            kind,
            root_count: AtomicUsize::new(0),
        }
    }

    /// The container-level dependency node.
    pub fn dep(&self) -> &Arc<Dep> {
        &self.dep
    }

    pub fn kind(&self) -> ObservedKind {
        self.kind
    }

    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::SeqCst)
    }

    /// Whether at least one owner treats this value as its root state.
    pub fn is_root(&self) -> bool {
        self.root_count() > 0
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("kind", &self.kind)
            .field("dep", &self.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

impl ArrayInterceptor for Observer {
    fn intercept(&self, method: super::ArrayMethod, inserted: &[Value]) {
        tracing::trace!(
            target: "lattice_observe",
            method = method.as_str(),
            inserted = inserted.len(),
            "intercepted array mutation"
        );
        observe_items(inserted);
        self.dep.notify();
    }
}

/// Wrap `value` so its property accesses are tracked.
///
/// Returns the existing observer if `value` was already wrapped, a new one
/// if it is eligible, and `None` for primitives, opaque references,
/// framework-internal objects, non-extensible objects, or when observation
/// is disabled. `as_root` bumps the root-data counter of the result.
pub fn observe(value: &Value, as_root: bool) -> Option<ObserverHandle> {
    let observer = match value {
        Value::Object(obj) => observe_object(obj),
        Value::Array(arr) => observe_array(arr),
        Value::Undefined
        | Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Opaque(_) => None,
    }?;

    if as_root {
        observer.root_count.fetch_add(1, Ordering::SeqCst);
    }
    Some(observer)
}

fn observe_object(obj: &Object) -> Option<ObserverHandle> {
    if let Some(existing) = obj.observer() {
        return Some(existing);
    }
    if !observation_enabled() || obj.is_internal() || !obj.is_extensible() {
        return None;
    }

    let (observer, created) = obj.attach_observer(|| Arc::new(Observer::new(ObservedKind::Object)));
    if created {
        tracing::trace!(target: "lattice_observe", keys = obj.len(), "observing object");
        walk(obj);
    }
    Some(observer)
}

fn observe_array(arr: &Array) -> Option<ObserverHandle> {
    if let Some(existing) = arr.observer() {
        return Some(existing);
    }
    if !observation_enabled() {
        return None;
    }

    let (observer, created) = arr.attach_observer(|| Arc::new(Observer::new(ObservedKind::Array)));
    if created {
        tracing::trace!(target: "lattice_observe", len = arr.len(), "observing array");
        arr.augment(Arc::clone(&observer) as Arc<dyn ArrayInterceptor>);
        observe_items(&arr.to_vec());
    }
    Some(observer)
}

/// Install a reactive accessor for every own enumerable key.
fn walk(obj: &Object) {
    for key in obj.keys() {
        define_reactive(obj, &key, None, DefineOptions::default());
    }
}

/// Observe every composite element.
pub(crate) fn observe_items(items: &[Value]) {
    for item in items {
        observe(item, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_is_idempotent() {
        let value = Value::from(Object::new().with("a", 1));
        let first = observe(&value, false).unwrap();
        let second = observe(&value, false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), ObservedKind::Object);
    }

    #[test]
    fn primitives_and_opaques_are_not_observed() {
        assert!(observe(&Value::from(1), false).is_none());
        assert!(observe(&Value::Null, false).is_none());
        assert!(observe(&Value::from(crate::value::Opaque::new(())), false).is_none());
    }

    #[test]
    fn ineligible_objects_are_not_observed() {
        assert!(observe(&Value::from(Object::new_internal()), false).is_none());

        let frozen = Object::new().with("a", 1);
        frozen.freeze();
        assert!(observe(&Value::from(frozen), false).is_none());
    }

    #[test]
    fn root_counter_increments() {
        let value = Value::from(Object::new());
        let observer = observe(&value, true).unwrap();
        assert!(observer.is_root());
        observe(&value, true);
        assert_eq!(observer.root_count(), 2);
    }

    #[test]
    fn nested_values_are_observed() {
        let child = Object::new().with("n", 1);
        let list = Array::from_vec(vec![Value::from(Object::new()), 5.into()]);
        let root = Object::new().with("child", child.clone()).with("list", list.clone());

        observe(&Value::from(root), false);
        assert!(child.observer().is_some());
        assert!(list.observer().is_some());
        assert!(list.get(0).as_object().and_then(Object::observer).is_some());
    }

    #[test]
    fn disabled_observation_skips_new_values() {
        let observed = Value::from(Object::new());
        let existing = observe(&observed, false).unwrap();

        let _paused = ObservationPaused::new();
        assert!(observe(&Value::from(Object::new()), false).is_none());
        assert!(Arc::ptr_eq(&observe(&observed, false).unwrap(), &existing));
    }

    #[test]
    fn pause_guard_restores_previous_state() {
        {
            let _paused = ObservationPaused::new();
            assert!(!observation_enabled());
        }
        assert!(observation_enabled());
    }

    #[test]
    fn self_referential_graphs_terminate() {
        let obj = Object::new();
        obj.set("me", obj.clone());
        let observer = observe(&Value::from(obj.clone()), false).unwrap();
        assert!(Arc::ptr_eq(&obj.observer().unwrap(), &observer));
    }
}
