//! The assembled messaging bus and the collaborators injected into it.
//!
//! - [`MessageMonitor`] - receives publish/handle outcomes; [`NullMonitor`]
//!   discards them
//! - [`MessageSerializer`] / [`SerializationFactory`] - payload encoding,
//!   JSON by default
//! - [`SerializationRegister`] - serializers keyed by message type
//! - [`MessagingBus`] - validated configuration plus the provisioning entry
//!   points used to wire topics, queues and tables

use crate::config::MessagingConfig;
use crate::descriptor::ResourceDescriptor;
use crate::error::{BusError, ConfigurationError, ProviderError, SerializationError};
use crate::naming::NamingStrategy;
use crate::provision::{Provisioned, ResourceProvisioner};
use crate::queue::RemoteQueue;
use crate::table::TableSpec;
use crate::topic::TopicLocator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, Span};

// ============================================================================
// Monitoring
// ============================================================================

/// Receives message outcomes for metrics.
///
/// Every method defaults to doing nothing so implementations only override
/// what they record.
pub trait MessageMonitor: Send + Sync {
    fn publish_time(&self, _message_type: &str, _elapsed: Duration) {}

    fn publish_failed(&self, _message_type: &str) {}

    fn handle_time(&self, _message_type: &str, _elapsed: Duration) {}

    fn handle_failed(&self, _message_type: &str) {}

    fn throttled(&self, _elapsed: Duration) {}
}

/// Monitor that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl MessageMonitor for NullMonitor {}

// ============================================================================
// Serialization
// ============================================================================

/// Encodes and decodes the payload of one message type
pub trait MessageSerializer: Send + Sync {
    fn serialize(&self, message: &serde_json::Value) -> Result<String, SerializationError>;

    fn deserialize(&self, payload: &str) -> Result<serde_json::Value, SerializationError>;
}

/// Produces the serializer registered for a message type
pub trait SerializationFactory: Send + Sync {
    fn serializer_for(&self, message_type: &str) -> Arc<dyn MessageSerializer>;
}

/// Plain JSON payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl MessageSerializer for JsonSerializer {
    fn serialize(&self, message: &serde_json::Value) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(message)?)
    }

    fn deserialize(&self, payload: &str) -> Result<serde_json::Value, SerializationError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Uses [`JsonSerializer`] for every message type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializationFactory;

impl SerializationFactory for JsonSerializationFactory {
    fn serializer_for(&self, _message_type: &str) -> Arc<dyn MessageSerializer> {
        Arc::new(JsonSerializer)
    }
}

/// Serializers keyed by message type
#[derive(Default)]
pub struct SerializationRegister {
    serializers: RwLock<HashMap<String, Arc<dyn MessageSerializer>>>,
}

impl SerializationRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer; an existing registration for the type is kept
    pub fn add_serializer(&self, message_type: &str, serializer: Arc<dyn MessageSerializer>) {
        let mut serializers = self
            .serializers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        serializers
            .entry(message_type.to_string())
            .or_insert(serializer);
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.serializers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(message_type)
    }

    /// Registered message types, sorted
    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .serializers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn serialize<T: Serialize>(
        &self,
        message_type: &str,
        message: &T,
    ) -> Result<String, SerializationError> {
        let value = serde_json::to_value(message)?;
        self.serializer(message_type)?.serialize(&value)
    }

    pub fn deserialize<T: DeserializeOwned>(
        &self,
        message_type: &str,
        payload: &str,
    ) -> Result<T, SerializationError> {
        let value = self.serializer(message_type)?.deserialize(payload)?;
        Ok(serde_json::from_value(value)?)
    }

    fn serializer(
        &self,
        message_type: &str,
    ) -> Result<Arc<dyn MessageSerializer>, SerializationError> {
        self.serializers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_type)
            .cloned()
            .ok_or_else(|| SerializationError::UnknownMessageType {
                message_type: message_type.to_string(),
            })
    }
}

impl fmt::Debug for SerializationRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationRegister")
            .field("message_types", &self.message_types())
            .finish()
    }
}

// ============================================================================
// Bus
// ============================================================================

/// A configured bus, produced by [`crate::BusSettings::build`]
pub struct MessagingBus {
    config: Arc<MessagingConfig>,
    naming: Arc<dyn NamingStrategy>,
    monitor: Arc<dyn MessageMonitor>,
    serialization_factory: Arc<dyn SerializationFactory>,
    register: Arc<SerializationRegister>,
    provisioner: ResourceProvisioner,
    span: Span,
}

impl MessagingBus {
    pub(crate) fn new(
        config: Arc<MessagingConfig>,
        naming: Arc<dyn NamingStrategy>,
        monitor: Arc<dyn MessageMonitor>,
        serialization_factory: Arc<dyn SerializationFactory>,
        register: Arc<SerializationRegister>,
        provisioner: ResourceProvisioner,
        span: Span,
    ) -> Self {
        Self {
            config,
            naming,
            monitor,
            serialization_factory,
            register,
            provisioner,
            span,
        }
    }

    pub fn config(&self) -> &Arc<MessagingConfig> {
        &self.config
    }

    pub fn naming_strategy(&self) -> &Arc<dyn NamingStrategy> {
        &self.naming
    }

    pub fn monitor(&self) -> &Arc<dyn MessageMonitor> {
        &self.monitor
    }

    pub fn serialization_factory(&self) -> &Arc<dyn SerializationFactory> {
        &self.serialization_factory
    }

    pub fn serialization_register(&self) -> &Arc<SerializationRegister> {
        &self.register
    }

    pub fn provisioner(&self) -> &ResourceProvisioner {
        &self.provisioner
    }

    /// Region selected as active, checked against the configured regions
    pub fn active_region(&self) -> Result<String, ConfigurationError> {
        let region = self.config.active_region();
        if self.config.regions().iter().any(|r| *r == region) {
            Ok(region)
        } else {
            Err(ConfigurationError::UnknownActiveRegion { region })
        }
    }

    /// Register the factory's serializer for a message type
    pub fn register_message_type(&self, message_type: &str) {
        if !self.register.is_registered(message_type) {
            self.register.add_serializer(
                message_type,
                self.serialization_factory.serializer_for(message_type),
            );
            debug!(parent: &self.span, message_type, "Registered message type");
        }
    }

    /// Check whether a topic ARN exists in a region
    pub async fn topic_exists(&self, region: &str, topic_arn: &str) -> Result<bool, ProviderError> {
        TopicLocator::new(self.provisioner.providers().topics.clone(), region)
            .with_span(self.span.clone())
            .exists(topic_arn)
            .await
    }

    /// Ensure the topic for a message type exists in the active region
    pub async fn ensure_topic_for(&self, message_type: &str) -> Result<Provisioned, BusError> {
        let region = self.active_region()?;
        self.ensure_topic_in(&region, message_type).await
    }

    /// Ensure the topic for a message type exists in every configured region
    pub async fn ensure_topics_for(
        &self,
        message_type: &str,
    ) -> Result<Vec<Provisioned>, BusError> {
        let mut provisioned = Vec::with_capacity(self.config.regions().len());
        for region in self.config.regions() {
            provisioned.push(self.ensure_topic_in(region, message_type).await?);
        }
        Ok(provisioned)
    }

    async fn ensure_topic_in(
        &self,
        region: &str,
        message_type: &str,
    ) -> Result<Provisioned, BusError> {
        self.register_message_type(message_type);
        let name = self.naming.topic_name(message_type);
        let provisioned = self
            .provisioner
            .ensure(ResourceDescriptor::topic(region, name))
            .await?;
        info!(
            parent: &self.span,
            message_type,
            region,
            outcome = %provisioned.outcome,
            "Topic ready for message type"
        );
        Ok(provisioned)
    }

    /// Ensure a subscriber queue and its error queue exist in the active region
    pub async fn ensure_queue(
        &self,
        queue_name: &str,
        message_type: &str,
    ) -> Result<Provisioned, BusError> {
        let region = self.active_region()?;
        self.register_message_type(message_type);
        let name = self.naming.queue_name(queue_name, message_type);
        let provisioned = self
            .provisioner
            .ensure(ResourceDescriptor::queue_with_error_queue(region, name))
            .await?;
        info!(
            parent: &self.span,
            queue = provisioned.descriptor.name(),
            message_type,
            outcome = %provisioned.outcome,
            "Queue ready for message type"
        );
        Ok(provisioned)
    }

    /// Ensure a caller-built descriptor exists
    pub async fn ensure_resource(
        &self,
        descriptor: ResourceDescriptor,
    ) -> Result<Provisioned, BusError> {
        Ok(self.provisioner.ensure(descriptor).await?)
    }

    /// Ensure a coordination table exists
    pub async fn ensure_table(&self, spec: &TableSpec) -> Result<Provisioned, BusError> {
        Ok(self.provisioner.ensure_table(spec).await?)
    }

    /// Bind a queue descriptor to this bus's queue provider
    pub fn remote_queue(&self, descriptor: ResourceDescriptor) -> RemoteQueue {
        RemoteQueue::new(self.provisioner.providers().queues.clone(), descriptor)
            .with_span(self.span.clone())
    }
}

impl fmt::Debug for MessagingBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingBus")
            .field("config", &self.config)
            .field("register", &self.register)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
