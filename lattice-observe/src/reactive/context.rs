//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently running.
//! This enables automatic dependency tracking: when a reactive property is
//! read, the property's [`Dep`](super::Dep) links the current subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing subscriber.
//! When a subscriber starts a run, it pushes itself onto the stack; when the
//! run completes, the guard pops it. Entering is therefore a save and
//! dropping is the matching restore.
//!
//! This design supports nested runs (e.g. a watcher created inside another
//! watcher's run, or a computed value evaluated while a watcher is reading
//! it). After the inner run finishes, the outer subscriber is current again
//! and its later reads keep linking to it.
//!
//! An entry may also be empty: [`ReactiveContext::untracked`] pushes "no
//! subscriber" so reads inside it link nothing.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    subscriber: Option<Arc<dyn Subscriber>>,
}

impl ContextEntry {
    fn id(&self) -> Option<SubscriberId> {
        self.subscriber.as_ref().map(|s| s.id())
    }
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the subscriber panics. The guard is
/// tied to the thread whose stack it pushed onto.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    _not_send: PhantomData<*const ()>,
}

impl ReactiveContext {
    /// Make `subscriber` the active subscriber until the guard drops.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        Self::push(ContextEntry {
            subscriber: Some(subscriber),
        })
    }

    /// Suspend tracking until the guard drops.
    pub fn enter_untracked() -> Self {
        Self::push(ContextEntry { subscriber: None })
    }

    fn push(entry: ContextEntry) -> Self {
        let subscriber_id = entry.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self {
            subscriber_id,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with no active subscriber.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = Self::enter_untracked();
        f()
    }

    /// Check if a subscriber is currently active.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// The active subscriber, if any.
    pub fn current() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::id))
    }

    /// Number of saved entries, including the current one.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.id()
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Dep;

    struct Probe(SubscriberId);

    impl Subscriber for Probe {
        fn id(&self) -> SubscriberId {
            self.0
        }

        fn track(&self, _dep: &Arc<Dep>) -> bool {
            true
        }

        fn update(self: Arc<Self>) {}

        fn run(&self) {}
    }

    fn probe() -> Arc<dyn Subscriber> {
        Arc::new(Probe(SubscriberId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = probe();
        let id = sub.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts_restore_outer() {
        let outer = probe();
        let inner = probe();
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_hides_the_active_subscriber() {
        let _ctx = ReactiveContext::enter(probe());
        assert!(ReactiveContext::is_active());

        let inside = ReactiveContext::untracked(ReactiveContext::is_active);
        assert!(!inside);
        assert!(ReactiveContext::is_active());
    }

    #[test]
    fn stack_is_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(probe());
            panic!("subscriber failed");
        });
        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
