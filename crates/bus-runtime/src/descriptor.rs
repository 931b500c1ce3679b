//! Resource descriptors for provisioned topics and queues.
//!
//! One data type describes every resource kind; behavior that differs per
//! kind lives in the [`crate::topic`], [`crate::queue`] and [`crate::table`]
//! modules and is selected by [`ResourceKind`].

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default message retention for queues (4 days)
pub const DEFAULT_RETENTION_PERIOD_SECONDS: u32 = 345_600;

/// Default message retention for error queues (14 days)
pub const DEFAULT_ERROR_QUEUE_RETENTION_PERIOD_SECONDS: u32 = 1_209_600;

/// Default visibility timeout
pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: u32 = 30;

/// Default number of receives before a message is moved to the error queue
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// Suffix appended to a queue name to form its error queue name
pub const ERROR_QUEUE_SUFFIX: &str = "_error";

/// Kind of remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Topic,
    Queue,
    Table,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic => write!(f, "topic"),
            Self::Queue => write!(f, "queue"),
            Self::Table => write!(f, "table"),
        }
    }
}

/// Tunable queue attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttributes {
    pub message_retention_seconds: u32,
    pub visibility_timeout_seconds: u32,
    pub delivery_delay_seconds: u32,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self {
            message_retention_seconds: DEFAULT_RETENTION_PERIOD_SECONDS,
            visibility_timeout_seconds: DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
            delivery_delay_seconds: 0,
        }
    }
}

impl QueueAttributes {
    /// Attributes for an error (dead-letter) queue
    pub fn error_queue() -> Self {
        Self {
            message_retention_seconds: DEFAULT_ERROR_QUEUE_RETENTION_PERIOD_SECONDS,
            ..Self::default()
        }
    }
}

/// Routes messages to a dead-letter resource after too many receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub max_receive_count: u32,
    pub dead_letter_target_arn: String,
}

impl RedrivePolicy {
    pub fn new(max_receive_count: u32, dead_letter_target_arn: impl Into<String>) -> Self {
        Self {
            max_receive_count,
            dead_letter_target_arn: dead_letter_target_arn.into(),
        }
    }

    /// Parse the provider's JSON attribute value.
    ///
    /// `maxReceiveCount` is accepted both as a number and as a string.
    pub fn from_attribute(value: &str) -> Result<Self, ProviderError> {
        let malformed = |message: String| ProviderError::MalformedResponse { message };

        let json: serde_json::Value = serde_json::from_str(value)
            .map_err(|e| malformed(format!("Invalid redrive policy: {}", e)))?;

        let max_receive_count = match json.get("maxReceiveCount") {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| malformed("Redrive policy is missing maxReceiveCount".to_string()))?;

        let dead_letter_target_arn = json
            .get("deadLetterTargetArn")
            .and_then(|v| v.as_str())
            .ok_or_else(|| malformed("Redrive policy is missing deadLetterTargetArn".to_string()))?
            .to_string();

        Ok(Self {
            max_receive_count,
            dead_letter_target_arn,
        })
    }

    /// Render as the provider's JSON attribute value
    pub fn to_attribute(&self) -> String {
        serde_json::json!({
            "maxReceiveCount": self.max_receive_count,
            "deadLetterTargetArn": self.dead_letter_target_arn,
        })
        .to_string()
    }
}

/// Identity and tunable attributes of a topic or queue.
///
/// Created with the logical name and region known; `arn` and `url` are filled
/// in by the provisioning step. The descriptor belongs to whoever requested
/// it; provisioning functions take it by value and hand it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    kind: ResourceKind,
    name: String,
    region: String,
    arn: Option<String>,
    url: Option<String>,
    attributes: QueueAttributes,
    redrive_policy: Option<RedrivePolicy>,
    error_resource: Option<Box<ResourceDescriptor>>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            region: region.into(),
            arn: None,
            url: None,
            attributes: QueueAttributes::default(),
            redrive_policy: None,
            error_resource: None,
        }
    }

    pub fn topic(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Topic, region, name)
    }

    pub fn queue(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Queue, region, name)
    }

    /// Queue descriptor with a linked error queue named `{name}_error`
    pub fn queue_with_error_queue(region: impl Into<String>, name: impl Into<String>) -> Self {
        let region = region.into();
        let name = name.into();
        let error_queue = Self::queue(region.clone(), format!("{}{}", name, ERROR_QUEUE_SUFFIX))
            .with_attributes(QueueAttributes::error_queue());
        Self::queue(region, name).with_error_resource(error_queue)
    }

    pub fn with_attributes(mut self, attributes: QueueAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_redrive_policy(mut self, policy: RedrivePolicy) -> Self {
        self.redrive_policy = Some(policy);
        self
    }

    pub fn with_error_resource(mut self, error_resource: ResourceDescriptor) -> Self {
        self.error_resource = Some(Box::new(error_resource));
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Unique resource identifier, once provisioned
    pub fn arn(&self) -> Option<&str> {
        self.arn.as_deref()
    }

    /// Address clients send to, once provisioned
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Check if the provisioning step has resolved this resource's identity
    pub fn is_resolved(&self) -> bool {
        match self.kind {
            ResourceKind::Queue => self.arn.is_some() && self.url.is_some(),
            ResourceKind::Topic | ResourceKind::Table => self.arn.is_some(),
        }
    }

    pub fn attributes(&self) -> &QueueAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: QueueAttributes) {
        self.attributes = attributes;
    }

    pub fn message_retention_seconds(&self) -> u32 {
        self.attributes.message_retention_seconds
    }

    pub fn set_message_retention_seconds(&mut self, seconds: u32) {
        self.attributes.message_retention_seconds = seconds;
    }

    pub fn visibility_timeout_seconds(&self) -> u32 {
        self.attributes.visibility_timeout_seconds
    }

    pub fn set_visibility_timeout_seconds(&mut self, seconds: u32) {
        self.attributes.visibility_timeout_seconds = seconds;
    }

    pub fn delivery_delay_seconds(&self) -> u32 {
        self.attributes.delivery_delay_seconds
    }

    pub fn set_delivery_delay_seconds(&mut self, seconds: u32) {
        self.attributes.delivery_delay_seconds = seconds;
    }

    pub fn redrive_policy(&self) -> Option<&RedrivePolicy> {
        self.redrive_policy.as_ref()
    }

    pub fn set_redrive_policy(&mut self, policy: Option<RedrivePolicy>) {
        self.redrive_policy = policy;
    }

    pub fn error_resource(&self) -> Option<&ResourceDescriptor> {
        self.error_resource.as_deref()
    }

    pub fn set_error_resource(&mut self, error_resource: Option<ResourceDescriptor>) {
        self.error_resource = error_resource.map(Box::new);
    }

    pub(crate) fn take_error_resource(&mut self) -> Option<ResourceDescriptor> {
        self.error_resource.take().map(|boxed| *boxed)
    }

    pub(crate) fn set_arn(&mut self, arn: impl Into<String>) {
        self.arn = Some(arn.into());
    }

    pub(crate) fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' in {}", self.kind, self.name, self.region)
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
