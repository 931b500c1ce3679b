//! File and environment configuration for a bus.
//!
//! Sources, applied in order with later sources overriding earlier ones:
//! 1. `config/bus.yaml` in the working directory, when present
//! 2. The file named by `BUS_CONFIG_FILE`, or the path passed to
//!    [`BusRuntimeSettings::load`]; required when given
//! 3. Environment variables prefixed `BUS__` with `__` between levels,
//!    e.g. `BUS__AWS__ENDPOINT_URL=http://localhost:4566`.
//!    `BUS__MESSAGING__REGIONS` takes a comma separated list.
//!
//! Every field has a default, so an unconfigured environment loads fine; the
//! region list is then empty and [`BusRuntimeSettings::validate`] rejects it.

use crate::assembler::{BusAssembler, BusSettings};
use crate::config::{
    validate_regions, MessagingConfig, DEFAULT_PUBLISHER_RETRY_COUNT,
    DEFAULT_PUBLISHER_RETRY_INTERVAL,
};
use crate::error::{BusError, ConfigurationError};
use crate::logging::LoggingConfig;
use crate::provision::ReadinessPolicy;
use crate::providers::{AwsProvider, AwsProviderConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "BUS_CONFIG_FILE";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "BUS";

const DEFAULT_CONFIG_FILE: &str = "config/bus";

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusRuntimeSettings {
    pub messaging: MessagingSettings,
    pub aws: AwsProviderConfig,
    pub table_readiness: ReadinessSettings,
    pub logging: LoggingConfig,
}

/// Serializable form of [`MessagingConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub regions: Vec<String>,
    pub publish_failure_reattempts: u32,
    pub publish_failure_backoff_ms: u64,

    /// Fixed active region; the first region when unset
    pub active_region: Option<String>,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            publish_failure_reattempts: DEFAULT_PUBLISHER_RETRY_COUNT,
            publish_failure_backoff_ms: DEFAULT_PUBLISHER_RETRY_INTERVAL.as_millis() as u64,
            active_region: None,
        }
    }
}

impl MessagingSettings {
    pub fn to_config(&self) -> MessagingConfig {
        let config = MessagingConfig::new(self.regions.iter().cloned())
            .with_publish_failure_reattempts(self.publish_failure_reattempts)
            .with_publish_failure_backoff(Duration::from_millis(self.publish_failure_backoff_ms));

        match &self.active_region {
            Some(region) => {
                let region = region.clone();
                config.with_active_region(move || region.clone())
            }
            None => config,
        }
    }
}

/// Serializable form of [`ReadinessPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub initial_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    pub max_wait_seconds: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        let policy = ReadinessPolicy::default();
        Self {
            initial_interval_ms: policy.initial_interval.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            max_interval_ms: policy.max_interval.as_millis() as u64,
            max_wait_seconds: policy.max_wait.as_secs(),
        }
    }
}

impl ReadinessSettings {
    pub fn to_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy::exponential(
            Duration::from_millis(self.initial_interval_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.max_interval_ms),
            Duration::from_secs(self.max_wait_seconds),
        )
    }
}

impl BusRuntimeSettings {
    /// Load settings from the configuration sources.
    ///
    /// `path` takes the place of `BUS_CONFIG_FILE` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name(DEFAULT_CONFIG_FILE)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        let explicit = match path {
            Some(path) => Some(path.to_string_lossy().into_owned()),
            None => std::env::var(CONFIG_FILE_ENV)
                .ok()
                .filter(|value| !value.is_empty()),
        };
        if let Some(explicit) = explicit {
            builder = builder.add_source(
                config::File::with_name(&explicit)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit, "Loading bus configuration from explicit path");
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("messaging.regions")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Load {
                message: e.to_string(),
            })?;

        config
            .try_deserialize()
            .map_err(|e| ConfigurationError::Load {
                message: e.to_string(),
            })
    }

    /// Check the settings before any provider is contacted
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_regions(&self.messaging.regions)?;

        if let Some(active) = &self.messaging.active_region {
            if !self.messaging.regions.contains(active) {
                return Err(ConfigurationError::UnknownActiveRegion {
                    region: active.clone(),
                });
            }
        }

        let readiness = &self.table_readiness;
        if readiness.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::Invalid {
                message: "table_readiness.backoff_multiplier must be at least 1.0".to_string(),
            });
        }
        if readiness.initial_interval_ms == 0 || readiness.max_wait_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "table_readiness intervals must be greater than zero".to_string(),
            });
        }
        if readiness.max_interval_ms < readiness.initial_interval_ms {
            return Err(ConfigurationError::Invalid {
                message: "table_readiness.max_interval_ms must not be below initial_interval_ms"
                    .to_string(),
            });
        }
        if readiness.initial_interval_ms > readiness.max_wait_seconds.saturating_mul(1000) {
            return Err(ConfigurationError::Invalid {
                message: "table_readiness.initial_interval_ms must not exceed max_wait_seconds"
                    .to_string(),
            });
        }

        if self.aws.request_timeout_seconds == 0 {
            return Err(ConfigurationError::Invalid {
                message: "aws.request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Validated bus settings wired to an AWS provider built from `aws`
    pub fn assemble(&self) -> Result<BusSettings, BusError> {
        self.validate()?;
        let provider = AwsProvider::new(self.aws.clone())?;

        Ok(BusAssembler::with_config(self.messaging.to_config())?
            .with_provider(Arc::new(provider))
            .with_readiness_policy(self.table_readiness.to_policy()))
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
