//! Tracing subscriber setup for binaries embedding the bus.
//!
//! The library itself only emits events; installing a subscriber is left to
//! the application.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a level is configured
pub const DEFAULT_FILTER: &str = "bus_runtime=info";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `bus_runtime=debug`
    pub level: Option<String>,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl LoggingConfig {
    /// Filter to install: `RUST_LOG` wins, then `level`, then [`DEFAULT_FILTER`]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = self.level.as_deref().unwrap_or(DEFAULT_FILTER);
            EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        })
    }
}

/// Install a global subscriber.
///
/// Returns an error when a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
