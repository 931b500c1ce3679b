//! Coordination table provisioning.
//!
//! [`TableProvisioner::ensure_exists`] runs a describe → create → await-ready
//! state machine that tolerates concurrent creators and the eventually
//! consistent describe of the remote provider:
//!
//! 1. **Describe**: an existing table is `Found` (waiting for it first when it
//!    is still `CREATING` or `UPDATING`).
//! 2. **Create**: a create rejected with one of
//!    [`CONCURRENT_CREATION_CODES`](crate::error::CONCURRENT_CREATION_CODES)
//!    means another caller is creating the table; the result is `RaceLost`
//!    and no readiness wait is performed.
//! 3. **Await-ready**: only after this caller's own create. Polls describe on
//!    the [`ReadinessPolicy`] schedule until the table is `ACTIVE`. Not-found
//!    and throttling responses are transient and keep the poll going. The
//!    wait ends with a timeout error once the policy's budget is spent, or a
//!    cancellation error when the [`CancellationToken`] fires.

use crate::error::{ProviderError, ProviderErrorClass, ProvisioningError};
use crate::provision::{CancellationToken, ProvisioningOutcome, ReadinessPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn, Span};

#[cfg(test)]
use mockall::automock;

// ============================================================================
// Table specification
// ============================================================================

/// Attribute type of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String
    S,
    /// Number
    N,
    /// Binary
    B,
}

/// Role of an attribute in the primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "AttributeName")]
    pub name: String,
    #[serde(rename = "AttributeType")]
    pub attribute_type: ScalarAttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    #[serde(rename = "AttributeName")]
    pub name: String,
    #[serde(rename = "KeyType")]
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

impl Default for ProvisionedThroughput {
    fn default() -> Self {
        Self {
            read_capacity_units: 1,
            write_capacity_units: 1,
        }
    }
}

/// Everything needed to create a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub region: String,
    pub name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub provisioned_throughput: ProvisionedThroughput,
}

impl TableSpec {
    /// Table keyed by a single string hash key
    pub fn with_hash_key(
        region: impl Into<String>,
        name: impl Into<String>,
        hash_key: impl Into<String>,
    ) -> Self {
        let hash_key = hash_key.into();
        Self {
            region: region.into(),
            name: name.into(),
            attribute_definitions: vec![AttributeDefinition {
                name: hash_key.clone(),
                attribute_type: ScalarAttributeType::S,
            }],
            key_schema: vec![KeySchemaElement {
                name: hash_key,
                key_type: KeyType::Hash,
            }],
            provisioned_throughput: ProvisionedThroughput::default(),
        }
    }

    /// Replace the default one-unit read and write capacity
    pub fn with_throughput(mut self, read_capacity_units: u64, write_capacity_units: u64) -> Self {
        self.provisioned_throughput = ProvisionedThroughput {
            read_capacity_units,
            write_capacity_units,
        };
        self
    }
}

/// Status reported by a table describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Unknown(String),
}

impl TableStatus {
    /// Map a provider status string, keeping unrecognised values
    pub fn parse(status: &str) -> Self {
        match status {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "UPDATING" => Self::Updating,
            "DELETING" => Self::Deleting,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Provider spelling of the status
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::Unknown(other) => other,
        }
    }

    /// Status that settles to `Active` without further requests
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Updating)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a table describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub status: TableStatus,
    pub arn: Option<String>,
}

// ============================================================================
// Provider interface
// ============================================================================

/// Table operations consumed from the remote provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Describe a table; `Ok(None)` when the provider reports it does not exist
    async fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> Result<Option<TableDescription>, ProviderError>;

    /// Issue a create request
    async fn create_table(&self, spec: &TableSpec) -> Result<(), ProviderError>;
}

// ============================================================================
// Provisioner
// ============================================================================

/// Ensures coordination tables exist
pub struct TableProvisioner {
    store: Arc<dyn TableStore>,
    readiness: ReadinessPolicy,
    cancellation: CancellationToken,
    span: Span,
}

impl TableProvisioner {
    /// Provisioner with the default readiness policy and no cancellation
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
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

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Schedule used while waiting for a created table
    pub fn readiness_policy(&self) -> &ReadinessPolicy {
        &self.readiness
    }

    /// Ensure the table exists, creating it if necessary.
    ///
    /// A created table is polled until it reports `ACTIVE`. A second call for
    /// the same table finds it rather than creating it again.
    ///
    /// ```rust
    /// use bus_runtime::providers::InMemoryProvider;
    /// use bus_runtime::{ProvisioningOutcome, ReadinessPolicy, TableProvisioner, TableSpec};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let provisioner = TableProvisioner::new(Arc::new(InMemoryProvider::default()))
    ///     .with_readiness_policy(ReadinessPolicy::fixed(
    ///         Duration::from_millis(10),
    ///         Duration::from_secs(1),
    ///     ));
    /// let spec = TableSpec::with_hash_key("eu-west-1", "bus-locks", "Id");
    ///
    /// let first = provisioner.ensure_exists(&spec).await.unwrap();
    /// let second = provisioner.ensure_exists(&spec).await.unwrap();
    ///
    /// assert_eq!(first, ProvisioningOutcome::Created);
    /// assert_eq!(second, ProvisioningOutcome::Found);
    /// # });
    /// ```
    pub async fn ensure_exists(
        &self,
        spec: &TableSpec,
    ) -> Result<ProvisioningOutcome, ProvisioningError> {
        if let Some(existing) = self.store.describe_table(&spec.region, &spec.name).await? {
            debug!(
                parent: &self.span,
                table = %spec.name,
                status = %existing.status,
                "Table already exists"
            );
            if existing.status.is_transitional() {
                self.await_ready(spec).await?;
            }
            return Ok(ProvisioningOutcome::Found);
        }

        info!(parent: &self.span, table = %spec.name, region = %spec.region, "Creating table");

        match self.store.create_table(spec).await {
            Ok(()) => {
                let polls = self.await_ready(spec).await?;
                info!(parent: &self.span, table = %spec.name, polls, "Table created and active");
                Ok(ProvisioningOutcome::Created)
            }
            Err(e) if e.is_concurrent_creation() => {
                warn!(
                    parent: &self.span,
                    table = %spec.name,
                    error = %e,
                    "Table is being created by another caller"
                );
                Ok(ProvisioningOutcome::RaceLost)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the table reports `ACTIVE`; returns the number of polls made.
    ///
    /// At least one poll is always made. The last delay is shortened to the
    /// remaining budget so the final poll lands on the deadline.
    async fn await_ready(&self, spec: &TableSpec) -> Result<u32, ProvisioningError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let waited = started.elapsed();
            let remaining = self.readiness.max_wait.saturating_sub(waited);
            if attempt > 0 && remaining.is_zero() {
                warn!(
                    parent: &self.span,
                    table = %spec.name,
                    waited_ms = waited.as_millis() as u64,
                    "Table did not become active in time"
                );
                return Err(ProvisioningError::Timeout {
                    resource: format!("table '{}'", spec.name),
                    waited,
                });
            }
            let delay = self.readiness.delay_for(attempt).min(remaining);

            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    return Err(ProvisioningError::Cancelled {
                        resource: format!("table '{}'", spec.name),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;

            match self.store.describe_table(&spec.region, &spec.name).await {
                Ok(Some(table)) if table.status == TableStatus::Active => {
                    info!(
                        parent: &self.span,
                        table = %table.name,
                        status = %table.status,
                        attempt,
                        "Table status"
                    );
                    return Ok(attempt);
                }
                Ok(Some(table)) => {
                    info!(
                        parent: &self.span,
                        table = %table.name,
                        status = %table.status,
                        attempt,
                        "Table status"
                    );
                }
                Ok(None) => {
                    debug!(
                        parent: &self.span,
                        table = %spec.name,
                        attempt,
                        "Table not visible yet"
                    );
                }
                Err(e) if e.class() == ProviderErrorClass::Transient => {
                    debug!(
                        parent: &self.span,
                        table = %spec.name,
                        attempt,
                        error = %e,
                        "Transient failure while waiting for table"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
