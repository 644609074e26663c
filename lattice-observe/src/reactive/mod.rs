//! Reactive Core
//!
//! This module turns plain [`Value`](crate::value::Value) graphs into
//! observable state and tracks which computations read which parts of it.
//!
//! # Concepts
//!
//! ## Observers
//!
//! [`observe`] wraps an object or array in place. Every property of an
//! object is replaced by a reactive accessor, and every array gets its seven
//! mutating methods intercepted. Nested containers are wrapped recursively.
//!
//! ## Deps
//!
//! A [`Dep`] is the unit of subscription. Each reactive property owns one,
//! and each wrapped container owns one more for structural changes (added or
//! deleted keys, sequence mutations). Reading links the active subscriber to
//! the dep; writing notifies every subscriber linked to it.
//!
//! ## Subscribers
//!
//! A [`Subscriber`] is anything that reruns when what it read changes. The
//! crate ships two: the eager [`Watcher`] and the lazy [`Computed`]. Host
//! frameworks can implement the trait for their own render jobs.
//!
//! # Implementation Notes
//!
//! The active subscriber lives on a thread-local stack
//! ([`ReactiveContext`]), so nested runs restore the outer subscriber when
//! they finish. Deps hold their subscribers weakly; a subscriber that is
//! dropped simply stops receiving notifications.

mod array;
mod computed;
mod context;
mod dep;
mod mutate;
mod observer;
mod property;
mod subscriber;
mod watcher;

pub use array::{ArrayInterceptor, ArrayMethod};
pub use computed::Computed;
pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use mutate::{delete_property, set_property};
pub use observer::{
    observation_enabled, observe, set_observation_enabled, ObservationPaused, ObservedKind,
    Observer, ObserverHandle,
};
pub use property::{define_reactive, CustomSetter, DefineOptions, ReactiveProperty};
pub use subscriber::{Subscriber, SubscriberId};
pub use watcher::{Watcher, WatcherOptions};
