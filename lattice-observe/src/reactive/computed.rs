//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs on creation. The first [`Computed::get`] evaluates the
//!    closure inside a tracking context and caches the result.
//!
//! 2. A notification from any dependency only marks the value dirty. No
//!    work is scheduled.
//!
//! 3. The next `get` re-evaluates if dirty, otherwise returns the cache.
//!
//! 4. When `get` is called while another subscriber is active, that
//!    subscriber is linked to every dep the computed value read. A watcher
//!    that reads a computed value therefore reruns whenever the underlying
//!    state changes, even though the computed value itself never notifies.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::{DepTracker, Subscriber, SubscriberId};

struct ComputedInner<T> {
    id: SubscriberId,
    this: Weak<ComputedInner<T>>,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: Mutex<Option<T>>,
    dirty: AtomicBool,
    active: AtomicBool,
    deps: Mutex<DepTracker>,
}

/// A lazily evaluated, cached derived value.
///
/// Clones share the same cache and dependency set.
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| ComputedInner {
            id: SubscriberId::new(),
            this: this.clone(),
            compute: Box::new(compute),
            value: Mutex::new(None),
            dirty: AtomicBool::new(true),
            active: AtomicBool::new(true),
            deps: Mutex::new(DepTracker::default()),
        });
        Self { inner }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The current value, re-evaluated first if dirty.
    pub fn get(&self) -> T {
        let value = self.inner.value();
        if ReactiveContext::is_active() {
            let deps: Vec<Arc<Dep>> = self.inner.deps.lock().deps().to_vec();
            for dep in &deps {
                dep.depend();
            }
        }
        value
    }

    /// Force re-evaluation on the next read.
    pub fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn has_value(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// Unlink from every dep. The cached value stays readable but is never
    /// refreshed again.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn value(&self) -> T {
        let cached = self.value.lock().clone();
        match cached {
            Some(value) if !self.dirty.load(Ordering::SeqCst) => value,
            Some(value) if !self.active.load(Ordering::SeqCst) => value,
            _ => self.evaluate(),
        }
    }

    fn evaluate(&self) -> T {
        let this = match self.this.upgrade() {
            Some(this) if self.active.load(Ordering::SeqCst) => this,
            _ => return ReactiveContext::untracked(|| (self.compute)()),
        };

        self.deps.lock().begin();
        // Clear first so writes made by the closure itself don't count.
        self.dirty.store(false, Ordering::SeqCst);
        let value = {
            let _ctx = ReactiveContext::enter(this);
            (self.compute)()
        };
        self.deps.lock().finish(self.id);

        *self.value.lock() = Some(value.clone());
        value
    }
}

impl<T> Subscriber for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn track(&self, dep: &Arc<Dep>) -> bool {
        self.deps.lock().track(dep)
    }

    fn update(self: Arc<Self>) {
        if self.active.load(Ordering::SeqCst) {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    fn run(&self) {
        if self.active.load(Ordering::SeqCst) {
            self.evaluate();
        }
    }

    fn teardown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.deps.lock().clear(self.id);
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("dirty", &self.is_dirty())
            .field("has_value", &self.has_value())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Watcher, WatcherOptions};
    use crate::scheduler::Scheduler;
    use crate::value::{Object, Value};
    use std::sync::atomic::AtomicI32;

    fn state(count: i32) -> Object {
        let obj = Object::new().with("count", count);
        observe(&Value::from(obj.clone()), false);
        obj
    }

    #[test]
    fn computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(!computed.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn caches_until_a_dependency_changes() {
        let obj = state(2);
        let call_count = Arc::new(AtomicI32::new(0));
        let (reader, calls) = (obj.clone(), call_count.clone());

        let doubled = Computed::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            reader.get("count").as_f64().unwrap_or(0.0) * 2.0
        });

        assert_eq!(doubled.get(), 4.0);
        assert_eq!(doubled.get(), 4.0);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(!doubled.is_dirty());

        obj.set("count", 5);
        assert!(doubled.is_dirty());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert_eq!(doubled.get(), 10.0);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mark_dirty_forces_recompute() {
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = counter.clone();
        let computed = Computed::new(move || counter_clone.load(Ordering::SeqCst));

        assert_eq!(computed.get(), 0);
        counter.store(5, Ordering::SeqCst);
        assert_eq!(computed.get(), 0);

        computed.mark_dirty();
        assert_eq!(computed.get(), 5);
    }

    #[test]
    fn outer_watcher_inherits_dependencies() {
        let obj = state(1);
        let reader = obj.clone();
        let doubled = Computed::new(move || reader.get("count").as_f64().unwrap_or(0.0) * 2.0);

        let scheduler = Scheduler::manual();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (computed, sink) = (doubled.clone(), seen.clone());
        let watcher = Watcher::with_options(
            move || sink.lock().push(computed.get()),
            WatcherOptions {
                scheduler: Some(scheduler.clone()),
                ..Default::default()
            },
        );
        assert_eq!(watcher.dependency_count(), 1);

        obj.set("count", 3);
        scheduler.flush();
        assert_eq!(*seen.lock(), vec![2.0, 6.0]);
    }

    #[test]
    fn evaluation_restores_the_outer_context() {
        let obj = state(1);
        let reader = obj.clone();
        let computed = Computed::new(move || reader.get("count"));

        let scheduler = Scheduler::manual();
        let (inner, outer_reader) = (computed.clone(), obj.clone());
        let watcher = Watcher::with_options(
            move || {
                inner.get();
                // Still tracked by the watcher after the nested evaluation.
                outer_reader.get("count");
            },
            WatcherOptions {
                scheduler: Some(scheduler),
                ..Default::default()
            },
        );

        assert_eq!(watcher.dependency_count(), 1);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn clones_share_the_cache() {
        let computed = Computed::new(|| 42);
        assert_eq!(computed.get(), 42);

        let other = computed.clone();
        assert_eq!(computed.id(), other.id());
        assert!(other.has_value());

        computed.mark_dirty();
        assert!(other.is_dirty());
    }

    #[test]
    fn teardown_freezes_the_cache() {
        let obj = state(1);
        let reader = obj.clone();
        let computed = Computed::new(move || reader.get("count"));

        assert_eq!(computed.get(), Value::from(1));
        computed.teardown();
        obj.set("count", 2);

        assert_eq!(computed.dependency_count(), 0);
        assert_eq!(computed.get(), Value::from(1));
    }
}
