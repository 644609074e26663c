//! Error and diagnostic types.
//!
//! Nothing in the observation core returns an error to its caller. Misuse is
//! reported through the warn sink (suppressed in production mode) and the
//! operation degrades to a no-op. Failures inside scheduled tasks are routed
//! to the central error handler without aborting the rest of the flush.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::config;

/// The escape-hatch operation that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Set,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Set => f.write_str("set"),
            MutationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Everything the reactive core can complain about.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    #[error("cannot {op} reactive property on undefined, null, or primitive value: {found}")]
    InvalidTarget { op: MutationKind, found: String },

    #[error(
        "avoid {op} of property `{key}` on an internal instance or its root data at runtime; \
         declare it upfront or assign null instead"
    )]
    RootMutation { op: MutationKind, key: String },

    #[error("arrays only accept index keys, got `{key}`")]
    NonIndexKey { key: String },

    #[error("error in {origin}: {message}")]
    TaskPanicked { origin: &'static str, message: String },
}

/// Report an advisory diagnostic.
///
/// Dropped entirely in production mode.
pub(crate) fn warn(error: ReactiveError) {
    if config::current().production {
        return;
    }
    match config::warn_handler() {
        Some(handler) => handler(&error),
        None => tracing::warn!(target: "lattice_observe", "{error}"),
    }
}

/// Forward a task failure to the central error handler.
pub(crate) fn handle_error(error: ReactiveError) {
    match config::error_handler() {
        Some(handler) => handler(&error),
        None => tracing::error!(target: "lattice_observe", "{error}"),
    }
}

/// Render a panic payload for [`ReactiveError::TaskPanicked`].
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        let err = ReactiveError::InvalidTarget {
            op: MutationKind::Delete,
            found: "null".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot delete reactive property on undefined, null, or primitive value: null"
        );

        let err = ReactiveError::TaskPanicked {
            origin: "next_tick",
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "error in next_tick: boom");
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
