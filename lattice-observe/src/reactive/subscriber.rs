//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that reads reactive state and
//! must rerun when that state changes: watchers, computed values, render
//! jobs owned by the host framework.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::dep::{Dep, DepId};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID is used to avoid
/// duplicate links on a [`Dep`] and duplicate entries in the flush queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that depends on reactive values.
pub trait Subscriber: Send + Sync {
    /// Identity used for deduplication.
    fn id(&self) -> SubscriberId;

    /// Called when this subscriber reads `dep` while it is the active
    /// subscriber. Returns whether `dep` should link it.
    fn track(&self, _dep: &Arc<Dep>) -> bool {
        true
    }

    /// Scheduling hook, invoked by [`Dep::notify`].
    fn update(self: Arc<Self>);

    /// Rerun routine, invoked by the flush.
    fn run(&self);

    /// Opt out of flush-queue deduplication.
    fn always_rerun(&self) -> bool {
        false
    }

    /// Drop every link and stop reacting.
    fn teardown(&self) {}
}

/// Per-run dependency bookkeeping shared by the built-in subscribers.
///
/// Each run collects a fresh set of deps. When the run finishes, deps that
/// were linked last time but not read this time are unlinked, so a
/// subscriber only ever reacts to what its latest run touched.
#[derive(Default)]
pub(crate) struct DepTracker {
    deps: Vec<Arc<Dep>>,
    dep_ids: HashSet<DepId>,
    new_deps: Vec<Arc<Dep>>,
    new_dep_ids: HashSet<DepId>,
}

impl DepTracker {
    pub(crate) fn begin(&mut self) {
        self.new_deps.clear();
        self.new_dep_ids.clear();
    }

    /// Record `dep` for the current run. Returns `true` the first time a
    /// dep is seen that was not already linked by a previous run.
    pub(crate) fn track(&mut self, dep: &Arc<Dep>) -> bool {
        if !self.new_dep_ids.insert(dep.id()) {
            return false;
        }
        self.new_deps.push(Arc::clone(dep));
        !self.dep_ids.contains(&dep.id())
    }

    /// Unlink stale deps and promote the current run's set.
    pub(crate) fn finish(&mut self, subscriber: SubscriberId) {
        for dep in &self.deps {
            if !self.new_dep_ids.contains(&dep.id()) {
                dep.unlink(subscriber);
            }
        }
        std::mem::swap(&mut self.deps, &mut self.new_deps);
        std::mem::swap(&mut self.dep_ids, &mut self.new_dep_ids);
        self.new_deps.clear();
        self.new_dep_ids.clear();
    }

    /// Unlink from everything.
    pub(crate) fn clear(&mut self, subscriber: SubscriberId) {
        for dep in self.deps.drain(..) {
            dep.unlink(subscriber);
        }
        self.dep_ids.clear();
    }

    pub(crate) fn deps(&self) -> &[Arc<Dep>] {
        &self.deps
    }

    pub(crate) fn len(&self) -> usize {
        self.deps.len()
    }
}
