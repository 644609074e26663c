//! Lattice Observe
//!
//! This crate provides the observable-state layer of the Lattice reactive UI
//! framework. It implements:
//!
//! - A dynamic value model (objects, arrays, primitives)
//! - In-place observation of value graphs with per-property dependency nodes
//! - Sequence mutation interception
//! - Explicit set/delete for structural changes
//! - Eager watchers and lazy computed values
//! - A deferred callback queue that batches reruns into one flush
//!
//! # Architecture
//!
//! - `value`: the value model observed state is built from
//! - `reactive`: observers, deps, the tracking context and subscribers
//! - `scheduler`: the deferred callback queue and `next_tick`
//! - `config` / `error`: process-wide settings and diagnostics
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_observe::prelude::*;
//!
//! let state = Object::new().with("count", 0);
//! observe(&Value::from(state.clone()), true);
//!
//! let reader = state.clone();
//! let _watcher = Watcher::new(move || {
//!     println!("count: {}", reader.get("count"));
//! });
//!
//! state.set("count", 1);
//! state.set("count", 2);
//! scheduler::flush();
//! // Watcher reruns once, prints: "count: 2"
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod value;

pub use config::Config;
pub use error::ReactiveError;

/// The types most programs need.
pub mod prelude {
    pub use crate::reactive::{
        delete_property, observe, set_property, Computed, Dep, ReactiveContext, Subscriber,
        SubscriberId, Watcher, WatcherOptions,
    };
    pub use crate::scheduler::{self, next_tick, tick, Scheduler};
    pub use crate::value::{Array, Key, Object, Value};
}
