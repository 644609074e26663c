//! Dependency Nodes
//!
//! A [`Dep`] is the registry of subscribers interested in one piece of
//! state: one per reactive property, plus one per observed container for
//! changes to the container as a whole (keys added or removed, sequence
//! mutated).
//!
//! Subscribers are held weakly. A dropped subscriber simply disappears from
//! the registry the next time it is notified.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a dependency node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Link = (SubscriberId, Weak<dyn Subscriber>);

/// An ordered, duplicate-free set of subscribers.
pub struct Dep {
    id: DepId,
    subs: Mutex<SmallVec<[Link; 4]>>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            id: DepId::new(),
            subs: Mutex::new(SmallVec::new()),
        }
    }

    pub fn id(&self) -> DepId {
        self.id
    }

    /// Link the active subscriber, if there is one.
    pub fn depend(self: &Arc<Self>) {
        if let Some(subscriber) = ReactiveContext::current() {
            if subscriber.track(self) {
                self.link(&subscriber);
            }
        }
    }

    /// Add `subscriber`. Linking the same subscriber twice is a no-op.
    pub fn link(&self, subscriber: &Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let mut subs = self.subs.lock();
        if subs.iter().any(|(existing, _)| *existing == id) {
            return;
        }
        subs.push((id, Arc::downgrade(subscriber)));
    }

    pub fn unlink(&self, id: SubscriberId) {
        self.subs.lock().retain(|(existing, _)| *existing != id);
    }

    /// Invoke every subscriber's scheduling hook once, in link order.
    ///
    /// Iterates over a snapshot taken up front, so subscribers that relink
    /// (or unlink) while handling the notification do not disturb it.
    pub fn notify(&self) {
        let snapshot: SmallVec<[Arc<dyn Subscriber>; 4]> = {
            let mut subs = self.subs.lock();
            subs.retain(|(_, sub)| sub.strong_count() > 0);
            subs.iter().filter_map(|(_, sub)| sub.upgrade()).collect()
        };

        for subscriber in snapshot {
            subscriber.update();
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs
            .lock()
            .iter()
            .filter(|(_, sub)| sub.strong_count() > 0)
            .count()
    }

    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.subs.lock().iter().any(|(existing, _)| *existing == id)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
