//! Shared provisioning vocabulary and the kind-dispatching provisioner.
//!
//! - [`ProvisioningOutcome`] - result of a create-or-find attempt
//! - [`ReadinessPolicy`] - bounded backoff used while waiting for a resource
//! - [`CancellationToken`] - aborts an in-progress wait
//! - [`ResourceProvisioner`] - routes a [`ResourceDescriptor`] to the topic,
//!   queue or table strategy based on its [`ResourceKind`]

use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::ProvisioningError;
use crate::providers::ResourceProvider;
use crate::queue::{ensure_queue, QueueStore};
use crate::table::{TableProvisioner, TableSpec, TableStore};
use crate::topic::{ensure_topic, TopicCatalog};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, Span};

/// Result of a create-or-find attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// The resource already existed
    Found,
    /// This caller created the resource
    Created,
    /// Another caller created the resource concurrently
    RaceLost,
}

impl ProvisioningOutcome {
    /// Whether this caller issued the successful create
    pub fn created_by_caller(&self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::Created => write!(f, "created"),
            Self::RaceLost => write!(f, "race_lost"),
        }
    }
}

/// A provisioned resource together with how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub outcome: ProvisioningOutcome,
    pub descriptor: ResourceDescriptor,
}

/// Backoff schedule and overall budget for readiness polling.
///
/// # Examples
///
/// ```rust
/// use bus_runtime::ReadinessPolicy;
/// use std::time::Duration;
///
/// let policy = ReadinessPolicy::default();
/// assert_eq!(policy.delay_for(0), Duration::from_secs(5));
/// assert_eq!(policy.delay_for(10), Duration::from_secs(5));
///
/// let policy = ReadinessPolicy::exponential(
///     Duration::from_secs(1),
///     2.0,
///     Duration::from_secs(8),
///     Duration::from_secs(60),
/// );
/// assert_eq!(policy.delay_for(2), Duration::from_secs(4));
/// assert_eq!(policy.delay_for(5), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessPolicy {
    /// Delay before the first readiness check
    pub initial_interval: Duration,

    /// Growth factor applied per attempt (1.0 keeps the interval fixed)
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay
    pub max_interval: Duration,

    /// Total time budget before giving up with a timeout
    pub max_wait: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5), Duration::from_secs(300))
    }
}

impl ReadinessPolicy {
    /// Poll on a fixed interval
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval: interval,
            backoff_multiplier: 1.0,
            max_interval: interval,
            max_wait,
        }
    }

    /// Poll with exponential backoff
    pub fn exponential(
        initial_interval: Duration,
        backoff_multiplier: f64,
        max_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            initial_interval,
            backoff_multiplier: backoff_multiplier.max(1.0),
            max_interval,
            max_wait,
        }
    }

    /// Delay before readiness check `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_interval.as_secs_f64());
        Duration::try_from_secs_f64(capped.max(0.0)).unwrap_or(self.max_interval)
    }
}

/// Cooperative cancellation signal shared between a caller and the
/// provisioning calls it started.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal cancellation to every clone of this token
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the token has been cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// The three provider capabilities the provisioning layer consumes
#[derive(Clone)]
pub struct ProviderSet {
    pub topics: Arc<dyn TopicCatalog>,
    pub queues: Arc<dyn QueueStore>,
    pub tables: Arc<dyn TableStore>,
}

impl ProviderSet {
    /// Use one provider object for all three capabilities
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: ResourceProvider + 'static,
    {
        Self {
            topics: provider.clone(),
            queues: provider.clone(),
            tables: provider,
        }
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet").finish_non_exhaustive()
    }
}

/// Ensures resources exist, choosing the strategy by resource kind
pub struct ResourceProvisioner {
    providers: ProviderSet,
    readiness: ReadinessPolicy,
    cancellation: CancellationToken,
    span: Span,
}

impl ResourceProvisioner {
    pub fn new(providers: ProviderSet) -> Self {
        Self {
            providers,
            readiness: ReadinessPolicy::default(),
            cancellation: CancellationToken::new(),
            span: Span::current(),
        }
    }

    pub fn with_readiness_policy(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Parent span for every event this provisioner emits
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Ensure a topic or queue exists and resolve its identity.
    ///
    /// Tables carry a key schema that a descriptor does not hold; use
    /// [`Self::ensure_table`] for them.
    pub async fn ensure(
        &self,
        descriptor: ResourceDescriptor,
    ) -> Result<Provisioned, ProvisioningError> {
        let provisioned = match descriptor.kind() {
            ResourceKind::Topic => {
                ensure_topic(self.providers.topics.as_ref(), descriptor, &self.span).await?
            }
            ResourceKind::Queue => {
                ensure_queue(self.providers.queues.as_ref(), descriptor, &self.span).await?
            }
            ResourceKind::Table => {
                return Err(ProvisioningError::MissingTableSpec {
                    table: descriptor.name().to_string(),
                })
            }
        };

        info!(
            parent: &self.span,
            kind = %provisioned.descriptor.kind(),
            name = provisioned.descriptor.name(),
            region = provisioned.descriptor.region(),
            arn = provisioned.descriptor.arn().unwrap_or_default(),
            outcome = %provisioned.outcome,
            "Resource provisioned"
        );

        Ok(provisioned)
    }

    /// Ensure a table exists and describe it as a resource
    pub async fn ensure_table(&self, spec: &TableSpec) -> Result<Provisioned, ProvisioningError> {
        let outcome = self.table_provisioner().ensure_exists(spec).await?;

        let mut descriptor = ResourceDescriptor::new(ResourceKind::Table, &spec.region, &spec.name);
        if let Some(arn) = self
            .providers
            .tables
            .describe_table(&spec.region, &spec.name)
            .await?
            .and_then(|table| table.arn)
        {
            descriptor.set_arn(arn);
        }

        Ok(Provisioned {
            outcome,
            descriptor,
        })
    }

    /// Table provisioner sharing this provisioner's policy, token and span
    pub fn table_provisioner(&self) -> TableProvisioner {
        TableProvisioner::new(self.providers.tables.clone())
            .with_readiness_policy(self.readiness.clone())
            .with_cancellation(self.cancellation.clone())
            .with_span(self.span.clone())
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
