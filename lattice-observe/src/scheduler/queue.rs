//! The deferred callback queue.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::tick::Tick;
use crate::error::{self, ReactiveError};
use crate::reactive::{Subscriber, SubscriberId};

/// A flush request handed to a host event loop.
pub type FlushJob = Box<dyn FnOnce() + Send>;

/// Host hook that runs a [`FlushJob`] at its next opportunity.
pub type HostPost = Arc<dyn Fn(FlushJob) + Send + Sync>;

/// How a scheduler defers its flush.
#[derive(Clone, Default)]
pub enum DeferStrategy {
    /// Use the current tokio runtime if there is one, otherwise wait for an
    /// explicit [`Scheduler::flush`].
    #[default]
    Auto,
    /// Spawn flushes onto this runtime.
    Tokio(Handle),
    /// Hand flushes to a host event loop.
    Host(HostPost),
    /// Never flush on our own; the host calls [`Scheduler::flush`].
    Manual,
}

/// The deferral primitive resolved for one flush request.
enum Primitive {
    Microtask(Handle),
    Host(HostPost),
    Manual,
}

impl Primitive {
    fn name(&self) -> &'static str {
        match self {
            Primitive::Microtask(_) => "tokio",
            Primitive::Host(_) => "host",
            Primitive::Manual => "manual",
        }
    }
}

enum Task {
    Rerun(Arc<dyn Subscriber>),
    Callback {
        origin: &'static str,
        run: Box<dyn FnOnce() + Send>,
    },
}

impl Task {
    fn run(self) {
        let (origin, result) = match self {
            Task::Rerun(subscriber) => ("watcher", catch_unwind(AssertUnwindSafe(|| subscriber.run()))),
            Task::Callback { origin, run } => (origin, catch_unwind(AssertUnwindSafe(run))),
        };
        if let Err(payload) = result {
            error::handle_error(ReactiveError::TaskPanicked {
                origin,
                message: error::panic_message(payload.as_ref()),
            });
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: Vec<Task>,
    /// Subscribers already in `pending`.
    queued: HashSet<SubscriberId>,
    flush_requested: bool,
    flushing: bool,
}

struct SchedulerInner {
    state: Mutex<QueueState>,
    strategy: DeferStrategy,
}

/// Coalesces scheduling requests into one flush per tick.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

impl Scheduler {
    pub fn new(strategy: DeferStrategy) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(QueueState::default()),
                strategy,
            }),
        }
    }

    /// A scheduler that only flushes when told to.
    pub fn manual() -> Self {
        Self::new(DeferStrategy::Manual)
    }

    /// The process-wide scheduler.
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(|| Scheduler::new(DeferStrategy::Auto))
    }

    /// Queue `subscriber` for a rerun in the next flush.
    ///
    /// A subscriber already waiting in this flush is not queued again unless
    /// it opts out of deduplication.
    pub fn queue(&self, subscriber: Arc<dyn Subscriber>) {
        let always = subscriber.always_rerun();
        let id = subscriber.id();
        self.schedule(Task::Rerun(subscriber), (!always).then_some(id));
    }

    /// Run `f` in the next flush. A panic is reported to the error handler
    /// and does not stop the rest of the flush.
    pub fn next_tick<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(
            Task::Callback {
                origin: "next_tick",
                run: Box::new(f),
            },
            None,
        );
    }

    /// A future that resolves once the next flush reaches it.
    pub fn tick(&self) -> Tick {
        let (tx, rx) = oneshot::channel();
        self.schedule(
            Task::Callback {
                origin: "tick",
                run: Box::new(move || {
                    let _ = tx.send(());
                }),
            },
            None,
        );
        Tick::new(rx)
    }

    fn schedule(&self, task: Task, dedup: Option<SubscriberId>) {
        let request = {
            let mut state = self.inner.state.lock();
            if let Some(id) = dedup {
                if !state.queued.insert(id) {
                    return;
                }
            }
            state.pending.push(task);
            // A running flush requests the next one when it finishes.
            !std::mem::replace(&mut state.flush_requested, true) && !state.flushing
        };
        if request {
            self.request_flush();
        }
    }

    fn resolve(&self) -> Primitive {
        match &self.inner.strategy {
            DeferStrategy::Auto => match Handle::try_current() {
                Ok(handle) => Primitive::Microtask(handle),
                Err(_) => Primitive::Manual,
            },
            DeferStrategy::Tokio(handle) => Primitive::Microtask(handle.clone()),
            DeferStrategy::Host(post) => Primitive::Host(Arc::clone(post)),
            DeferStrategy::Manual => Primitive::Manual,
        }
    }

    fn request_flush(&self) {
        let primitive = self.resolve();
        tracing::debug!(target: "lattice_observe", via = primitive.name(), "flush requested");
        match primitive {
            Primitive::Microtask(handle) => {
                let scheduler = self.clone();
                handle.spawn(async move {
                    scheduler.flush();
                });
            }
            Primitive::Host(post) => {
                let scheduler = self.clone();
                post(Box::new(move || {
                    scheduler.flush();
                }));
            }
            Primitive::Manual => {}
        }
    }

    /// Whether flushes currently run as tasks on an async runtime.
    pub fn is_using_microtask(&self) -> bool {
        matches!(self.resolve(), Primitive::Microtask(_))
    }

    /// Run everything queued so far, in scheduling order. Returns how many
    /// tasks ran.
    ///
    /// Work scheduled while the flush runs waits for the next flush. Calling
    /// `flush` from inside a flush does nothing.
    pub fn flush(&self) -> usize {
        let tasks = {
            let mut state = self.inner.state.lock();
            if state.flushing {
                return 0;
            }
            state.flushing = true;
            state.flush_requested = false;
            state.queued.clear();
            std::mem::take(&mut state.pending)
        };

        let count = tasks.len();
        if count > 0 {
            tracing::debug!(target: "lattice_observe", tasks = count, "flushing deferred queue");
        }
        for task in tasks {
            task.run();
        }

        let request = {
            let mut state = self.inner.state.lock();
            state.flushing = false;
            state.flush_requested = !state.pending.is_empty();
            state.flush_requested
        };
        if request {
            self.request_flush();
        }
        count
    }

    /// Whether a flush has been requested and not yet run.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().flush_requested
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DeferStrategy::Auto)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("pending", &state.pending.len())
            .field("flush_requested", &state.flush_requested)
            .field("flushing", &state.flushing)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
