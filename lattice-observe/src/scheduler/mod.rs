//! Deferred Callback Queue
//!
//! State changes rarely come alone. Rather than rerunning a watcher for every
//! write, notifications queue work on a [`Scheduler`], which runs everything
//! in one flush at the next opportunity:
//!
//! - Inside a tokio runtime the flush is spawned as a task, so it runs right
//!   after the current task yields.
//! - Under a host event loop ([`DeferStrategy::Host`]) the flush is posted
//!   to the host.
//! - Otherwise the host drives it by calling [`Scheduler::flush`].
//!
//! Only one flush is requested per batch. A flush runs the tasks queued when
//! it started, in order, and leaves anything queued during it for the next
//! flush. A panicking task is reported through the error handler and the
//! remaining tasks still run.
//!
//! The free functions below operate on [`Scheduler::global`].

mod queue;
mod tick;

pub use queue::{DeferStrategy, FlushJob, HostPost, Scheduler};
pub use tick::Tick;

/// Run `f` in the next flush of the global scheduler.
pub fn next_tick<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    Scheduler::global().next_tick(f);
}

/// Resolves after the next flush of the global scheduler.
pub fn tick() -> Tick {
    Scheduler::global().tick()
}

/// Flush the global scheduler now. Returns how many tasks ran.
pub fn flush() -> usize {
    Scheduler::global().flush()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn flush_runs_as_a_task_inside_tokio() {
        let scheduler = Scheduler::new(DeferStrategy::Auto);
        assert!(scheduler.is_using_microtask());

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        scheduler.next_tick(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        scheduler.tick().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tick_resolves_after_earlier_callbacks() {
        let scheduler = Scheduler::new(DeferStrategy::Tokio(tokio::runtime::Handle::current()));
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = log.clone();
        scheduler.next_tick(move || first.lock().push(1));
        let tick = scheduler.tick();
        let second = log.clone();
        scheduler.next_tick(move || second.lock().push(2));

        tick.await;
        assert!(log.lock().starts_with(&[1]));
    }

    #[test]
    fn panicking_callback_does_not_abort_the_flush() {
        let scheduler = Scheduler::manual();
        let hits = Arc::new(AtomicUsize::new(0));

        scheduler.next_tick(|| panic!("callback failed"));
        let counter = hits.clone();
        scheduler.next_tick(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(scheduler.flush(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn dropped_scheduler_still_resolves_ticks() {
        let scheduler = Scheduler::manual();
        let tick = scheduler.tick();
        drop(scheduler);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(tick);
    }
}
