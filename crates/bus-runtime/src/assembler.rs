//! Staged assembly of a [`MessagingBus`].
//!
//! [`BusAssembler::in_regions`] validates the region list and returns
//! [`BusSettings`] holding the defaults (identity naming, [`NullMonitor`],
//! JSON serialization). Optional settings are applied to `BusSettings`, and
//! [`BusSettings::build`] is the single finalizing step.
//!
//! # Examples
//!
//! ```rust
//! use bus_runtime::providers::InMemoryProvider;
//! use bus_runtime::{BusAssembler, PrefixedNamingStrategy};
//! use std::sync::Arc;
//!
//! let bus = BusAssembler::in_regions(["eu-west-1", "us-east-1"])
//!     .unwrap()
//!     .with_naming_strategy(PrefixedNamingStrategy::new("uat"))
//!     .with_provider(Arc::new(InMemoryProvider::default()))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(bus.active_region().unwrap(), "eu-west-1");
//! ```

use crate::bus::{
    JsonSerializationFactory, MessageMonitor, MessagingBus, NullMonitor, SerializationFactory,
    SerializationRegister,
};
use crate::config::MessagingConfig;
use crate::error::ConfigurationError;
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::provision::{CancellationToken, ProviderSet, ReadinessPolicy, ResourceProvisioner};
use crate::providers::ResourceProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Span};

/// Entry point for building a bus
pub struct BusAssembler;

impl BusAssembler {
    /// Start assembling a bus for the given regions.
    ///
    /// The first region is the default active region. Fails when the region
    /// list is empty, starts with a blank entry, or repeats a region.
    pub fn in_regions<I, S>(regions: I) -> Result<BusSettings, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BusSettings::new(MessagingConfig::new(regions))
    }

    /// Start assembling a bus from an already built configuration
    pub fn with_config(config: MessagingConfig) -> Result<BusSettings, ConfigurationError> {
        BusSettings::new(config)
    }
}

/// Validated configuration plus optional settings, awaiting [`Self::build`]
pub struct BusSettings {
    config: MessagingConfig,
    naming: Arc<dyn NamingStrategy>,
    monitor: Arc<dyn MessageMonitor>,
    serialization_factory: Arc<dyn SerializationFactory>,
    register: Arc<SerializationRegister>,
    providers: Option<ProviderSet>,
    readiness: ReadinessPolicy,
    cancellation: CancellationToken,
    span: Span,
}

impl BusSettings {
    fn new(config: MessagingConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self {
            config,
            naming: Arc::new(DefaultNamingStrategy),
            monitor: Arc::new(NullMonitor),
            serialization_factory: Arc::new(JsonSerializationFactory),
            register: Arc::new(SerializationRegister::new()),
            providers: None,
            readiness: ReadinessPolicy::default(),
            cancellation: CancellationToken::new(),
            span: Span::current(),
        })
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    pub fn with_monitor<M: MessageMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn with_serialization_factory<F: SerializationFactory + 'static>(
        mut self,
        factory: F,
    ) -> Self {
        self.serialization_factory = Arc::new(factory);
        self
    }

    pub fn with_naming_strategy<N: NamingStrategy + 'static>(mut self, naming: N) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// Publish re-attempts and the backoff between them
    pub fn with_publish_retry(mut self, reattempts: u32, backoff: Duration) -> Self {
        self.config = self
            .config
            .with_publish_failure_reattempts(reattempts)
            .with_publish_failure_backoff(backoff);
        self
    }

    /// Function selecting the active region; checked by [`Self::build`]
    pub fn with_active_region<F>(mut self, selector: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.config = self.config.with_active_region(selector);
        self
    }

    /// Use one provider for topics, queues and tables
    pub fn with_provider<P: ResourceProvider + 'static>(mut self, provider: Arc<P>) -> Self {
        self.providers = Some(ProviderSet::from_provider(provider));
        self
    }

    pub fn with_providers(mut self, providers: ProviderSet) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_readiness_policy(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Token that aborts readiness waits started by the bus
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Parent span for every event the bus and its components emit
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Finish assembly.
    ///
    /// Fails when no provider was set or the active region selector picks a
    /// region outside the configured list.
    pub fn build(self) -> Result<MessagingBus, ConfigurationError> {
        let Self {
            config,
            naming,
            monitor,
            serialization_factory,
            register,
            providers,
            readiness,
            cancellation,
            span,
        } = self;

        config.validate()?;
        let providers = providers.ok_or(ConfigurationError::MissingProvider)?;

        let active_region = config.active_region();
        if !config.regions().contains(&active_region) {
            return Err(ConfigurationError::UnknownActiveRegion {
                region: active_region,
            });
        }

        info!(
            parent: &span,
            regions = ?config.regions(),
            active_region = %active_region,
            "Messaging bus assembled"
        );

        let provisioner = ResourceProvisioner::new(providers)
            .with_readiness_policy(readiness)
            .with_cancellation(cancellation)
            .with_span(span.clone());

        Ok(MessagingBus::new(
            Arc::new(config),
            naming,
            monitor,
            serialization_factory,
            register,
            provisioner,
            span,
        ))
    }
}

impl fmt::Debug for BusSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSettings")
            .field("config", &self.config)
            .field("has_providers", &self.providers.is_some())
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
