//! Watcher Implementation
//!
//! A Watcher is an eager subscriber: a closure that runs whenever the
//! reactive state it read last time changes.
//!
//! # How Watchers Work
//!
//! 1. When created, the watcher runs its closure immediately inside a
//!    tracking context. Every reactive read links the watcher to a [`Dep`].
//!
//! 2. When any of those deps is notified, the watcher queues itself on its
//!    [`Scheduler`] (or reruns on the spot if it is `sync`).
//!
//! 3. Each rerun rebuilds the dependency set from scratch. Deps that were
//!    read last time but not this time are unlinked.
//!
//! Dropping a watcher tears it down. A rerun that was already queued when
//! that happened becomes a no-op.
//!
//! [`Dep`]: super::Dep

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::{DepTracker, Subscriber, SubscriberId};
use crate::scheduler::Scheduler;

/// Options for [`Watcher::with_options`].
#[derive(Debug, Clone, Default)]
pub struct WatcherOptions {
    /// Rerun synchronously inside the notification instead of queueing.
    pub sync: bool,
    /// Queue every notification, even if a rerun is already waiting.
    pub always_rerun: bool,
    /// Queue reruns here instead of on [`Scheduler::global`].
    pub scheduler: Option<Scheduler>,
}

struct WatcherInner {
    id: SubscriberId,
    this: Weak<WatcherInner>,
    run: Box<dyn Fn() + Send + Sync>,
    deps: Mutex<DepTracker>,
    active: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
    sync: bool,
    always_rerun: bool,
    scheduler: Option<Scheduler>,
}

/// A side-effecting computation that reruns when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = Value::from(Object::new().with("count", 0));
/// observe(&state, true);
///
/// let _watcher = Watcher::new(move || {
///     println!("count is {}", state.as_object().unwrap().get("count"));
/// });
/// ```
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher and run it once to collect its dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(run, WatcherOptions::default())
    }

    pub fn with_options<F>(run: F, options: WatcherOptions) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| WatcherInner {
            id: SubscriberId::new(),
            this: this.clone(),
            run: Box::new(run),
            deps: Mutex::new(DepTracker::default()),
            active: AtomicBool::new(true),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            sync: options.sync,
            always_rerun: options.always_rerun,
            scheduler: options.scheduler,
        });
        inner.run();
        Self { inner }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Rerun now, outside the scheduler.
    pub fn run(&self) {
        self.inner.run();
    }

    /// Unlink from every dep. Further notifications and reruns do nothing.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of completed runs, including the initial one.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of deps linked by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// This watcher as a type-erased subscriber.
    pub fn subscriber(&self) -> Arc<dyn Subscriber> {
        Arc::clone(&self.inner) as Arc<dyn Subscriber>
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn track(&self, dep: &Arc<Dep>) -> bool {
        self.deps.lock().track(dep)
    }

    fn update(self: Arc<Self>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if self.sync {
            self.run();
            return;
        }
        match &self.scheduler {
            Some(scheduler) => scheduler.queue(self.clone()),
            None => Scheduler::global().queue(self),
        }
    }

    fn run(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        // A sync watcher can be notified by its own writes.
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };

        self.deps.lock().begin();
        let result = {
            let _ctx = ReactiveContext::enter(this);
            panic::catch_unwind(AssertUnwindSafe(|| (self.run)()))
        };
        self.deps.lock().finish(self.id);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);

        if !self.active.load(Ordering::SeqCst) {
            // Torn down from inside its own run.
            self.deps.lock().clear(self.id);
        }
        if let Err(payload) = result {
            panic::resume_unwind(payload);
        }
    }

    fn always_rerun(&self) -> bool {
        self.always_rerun
    }

    fn teardown(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::trace!(target: "lattice_observe", id = ?self.id, "watcher torn down");
        }
        self.deps.lock().clear(self.id);
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observe;
    use crate::value::{Object, Value};
    use std::sync::atomic::AtomicI32;

    fn state(key: &str, value: i32) -> Object {
        let obj = Object::new().with(key, value);
        observe(&Value::from(obj.clone()), false);
        obj
    }

    fn manual() -> WatcherOptions {
        WatcherOptions {
            scheduler: Some(Scheduler::manual()),
            ..Default::default()
        }
    }

    #[test]
    fn watcher_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let watcher = Watcher::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn notification_queues_a_rerun() {
        let obj = state("count", 0);
        let seen = Arc::new(AtomicI32::new(-1));
        let options = manual();
        let scheduler = options.scheduler.clone().unwrap();

        let (reader, sink) = (obj.clone(), seen.clone());
        let watcher = Watcher::with_options(
            move || {
                let v = reader.get("count").as_f64().unwrap_or(-1.0);
                sink.store(v as i32, Ordering::SeqCst);
            },
            options,
        );
        assert_eq!(watcher.dependency_count(), 1);

        obj.set("count", 5);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_len(), 1);

        scheduler.flush();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn sync_watcher_reruns_inside_notify() {
        let obj = state("count", 0);
        let reader = obj.clone();
        let watcher = Watcher::with_options(
            move || {
                reader.get("count");
            },
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
        );

        obj.set("count", 1);
        obj.set("count", 2);
        assert_eq!(watcher.run_count(), 3);
    }

    #[test]
    fn sync_watcher_writing_its_own_dep_does_not_recurse() {
        let obj = state("count", 0);
        let target = obj.clone();
        let watcher = Watcher::with_options(
            move || {
                let next = target.get("count").as_f64().unwrap_or(0.0) + 1.0;
                target.set("count", next);
            },
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
        );

        assert_eq!(watcher.run_count(), 1);
        assert_eq!(obj.get("count"), Value::from(1));
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let obj = Object::new()
            .with("flag", true)
            .with("a", 1)
            .with("b", 2);
        observe(&Value::from(obj.clone()), false);
        let options = manual();
        let scheduler = options.scheduler.clone().unwrap();

        let reader = obj.clone();
        let watcher = Watcher::with_options(
            move || {
                if reader.get("flag").as_bool() == Some(true) {
                    reader.get("a");
                } else {
                    reader.get("b");
                }
            },
            options,
        );
        assert_eq!(watcher.dependency_count(), 2);

        obj.set("flag", false);
        scheduler.flush();
        assert_eq!(watcher.run_count(), 2);

        // "a" is no longer read, so writing it does nothing.
        obj.set("a", 10);
        assert_eq!(scheduler.pending_len(), 0);
        obj.set("b", 20);
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[test]
    fn teardown_stops_reruns() {
        let obj = state("count", 0);
        let options = manual();
        let scheduler = options.scheduler.clone().unwrap();
        let reader = obj.clone();
        let watcher = Watcher::with_options(
            move || {
                reader.get("count");
            },
            options,
        );

        obj.set("count", 1);
        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(watcher.dependency_count(), 0);

        scheduler.flush();
        obj.set("count", 2);
        assert_eq!(watcher.run_count(), 1);
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn dropping_unlinks() {
        let obj = state("count", 0);
        let reader = obj.clone();
        let watcher = Watcher::with_options(
            move || {
                reader.get("count");
            },
            manual(),
        );
        let id = watcher.id();
        let dep = match obj.property("count").map(|p| p.slot) {
            Some(crate::value::Slot::Reactive(prop)) => prop.dep().clone(),
            _ => panic!("count should be reactive"),
        };
        assert!(dep.has_subscriber(id));

        drop(watcher);
        assert!(!dep.has_subscriber(id));
    }

    #[test]
    fn panicking_run_restores_context() {
        let obj = state("count", 0);
        let reader = obj.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            Watcher::with_options(
                move || {
                    reader.get("count");
                    panic!("boom");
                },
                manual(),
            )
        }));
        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
