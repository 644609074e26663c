//! Process-wide configuration.
//!
//! The reactive core has very little to configure: whether diagnostics are
//! emitted (`production` mode silences them) and where warnings and task
//! failures are delivered. When no sink is installed, both go to `tracing`.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ReactiveError;

/// Sink for advisory diagnostics.
pub type WarnHandler = Arc<dyn Fn(&ReactiveError) + Send + Sync>;

/// Central handler for failures raised by scheduled tasks.
pub type ErrorHandler = Arc<dyn Fn(&ReactiveError) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid observe config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serializable configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Suppress all advisory diagnostics.
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            production: !cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }
}

#[derive(Default)]
struct Hooks {
    warn: Option<WarnHandler>,
    error: Option<ErrorHandler>,
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();
static HOOKS: OnceLock<RwLock<Hooks>> = OnceLock::new();

fn get_config() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

fn get_hooks() -> &'static RwLock<Hooks> {
    HOOKS.get_or_init(|| RwLock::new(Hooks::default()))
}

/// Snapshot of the active configuration.
pub fn current() -> Config {
    get_config().read().clone()
}

/// Replace the active configuration.
pub fn set(config: Config) {
    *get_config().write() = config;
}

/// Install (or clear) the warn sink.
pub fn set_warn_handler(handler: Option<WarnHandler>) {
    get_hooks().write().warn = handler;
}

/// Install (or clear) the central error handler.
pub fn set_error_handler(handler: Option<ErrorHandler>) {
    get_hooks().write().error = handler;
}

pub(crate) fn warn_handler() -> Option<WarnHandler> {
    get_hooks().read().warn.clone()
}

pub(crate) fn error_handler() -> Option<ErrorHandler> {
    get_hooks().read().error.clone()
}
