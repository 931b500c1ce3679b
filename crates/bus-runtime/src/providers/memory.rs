//! In-memory resource provider for testing and development.
//!
//! Implements every provider trait against process-local state:
//! - paged topic listings with a configurable page size
//! - queues with attributes and redrive policies
//! - tables whose creation is eventually consistent: a new table stays
//!   invisible to describe for a configurable number of calls and then
//!   reports `CREATING` for a further number of calls before `ACTIVE`
//!
//! Fault injection and call counters let tests observe how the provisioning
//! layer drives the provider.

use crate::descriptor::{QueueAttributes, RedrivePolicy};
use crate::error::ProviderError;
use crate::queue::{QueueStore, RemoteQueueAttributes};
use crate::table::{TableDescription, TableSpec, TableStatus, TableStore};
use crate::topic::{TopicCatalog, TopicPage};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Account id used in generated ARNs and URLs
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

/// Behavior of the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryConfig {
    pub account_id: String,

    /// Topics returned per listing page
    pub page_size: usize,

    /// Describe calls after creation that still report the table missing
    pub hidden_describes_after_create: u32,

    /// Describe calls after that which report `CREATING`
    pub creating_describes_after_create: u32,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            page_size: 100,
            hidden_describes_after_create: 0,
            creating_describes_after_create: 0,
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

struct StoredQueue {
    region: String,
    name: String,
    arn: String,
    attributes: QueueAttributes,
    redrive_policy: Option<RedrivePolicy>,
}

struct StoredTable {
    spec: TableSpec,
    arn: String,
    hidden_remaining: u32,
    creating_remaining: u32,
    /// Status reported regardless of the simulated creation delay
    pinned_status: Option<TableStatus>,
}

#[derive(Default)]
struct Faults {
    create_topic: Option<ProviderError>,
    create_queue: Option<ProviderError>,
    create_table: Option<ProviderError>,
    describe_table: Option<ProviderError>,
}

/// Calls received, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_topics: usize,
    pub create_topic: usize,
    pub get_queue_url: usize,
    pub create_queue: usize,
    pub get_queue_attributes: usize,
    pub set_queue_attributes: usize,
    pub describe_table: usize,
    pub create_table: usize,
}

#[derive(Default)]
struct Storage {
    /// Keyed by (region, name) so listings come back in a stable order
    topics: BTreeMap<(String, String), String>,
    /// Keyed by queue URL
    queues: HashMap<String, StoredQueue>,
    /// Keyed by (region, name)
    tables: HashMap<(String, String), StoredTable>,
    faults: Faults,
    calls: CallCounts,
}

// ============================================================================
// Provider
// ============================================================================

/// Process-local implementation of every provider trait
pub struct InMemoryProvider {
    config: InMemoryConfig,
    storage: Mutex<Storage>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

impl InMemoryProvider {
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            config,
            storage: Mutex::new(Storage::default()),
        }
    }

    pub fn config(&self) -> &InMemoryConfig {
        &self.config
    }

    pub fn topic_arn(&self, region: &str, name: &str) -> String {
        format!("arn:aws:sns:{}:{}:{}", region, self.config.account_id, name)
    }

    pub fn queue_arn(&self, region: &str, name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", region, self.config.account_id, name)
    }

    pub fn queue_url(&self, region: &str, name: &str) -> String {
        format!(
            "https://sqs.{}.amazonaws.com/{}/{}",
            region, self.config.account_id, name
        )
    }

    pub fn table_arn(&self, region: &str, name: &str) -> String {
        format!(
            "arn:aws:dynamodb:{}:{}:table/{}",
            region, self.config.account_id, name
        )
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Add a topic directly, returning its ARN
    pub async fn add_topic(&self, region: &str, name: &str) -> String {
        let arn = self.topic_arn(region, name);
        self.storage
            .lock()
            .await
            .topics
            .insert((region.to_string(), name.to_string()), arn.clone());
        arn
    }

    /// Add a queue directly, returning its URL
    pub async fn add_queue(
        &self,
        region: &str,
        name: &str,
        attributes: QueueAttributes,
        redrive_policy: Option<RedrivePolicy>,
    ) -> String {
        let url = self.queue_url(region, name);
        let queue = StoredQueue {
            region: region.to_string(),
            name: name.to_string(),
            arn: self.queue_arn(region, name),
            attributes,
            redrive_policy,
        };
        self.storage.lock().await.queues.insert(url.clone(), queue);
        url
    }

    /// Add a table directly; it reports `status` until [`Self::activate_table`]
    pub async fn add_table(&self, spec: TableSpec, status: TableStatus) {
        let table = StoredTable {
            arn: self.table_arn(&spec.region, &spec.name),
            spec,
            hidden_remaining: 0,
            creating_remaining: 0,
            pinned_status: Some(status),
        };
        self.storage.lock().await.tables.insert(
            (table.spec.region.clone(), table.spec.name.clone()),
            table,
        );
    }

    /// Mark a table as active, ending any simulated creation delay
    pub async fn activate_table(&self, region: &str, name: &str) {
        let mut storage = self.storage.lock().await;
        if let Some(table) = storage
            .tables
            .get_mut(&(region.to_string(), name.to_string()))
        {
            table.hidden_remaining = 0;
            table.creating_remaining = 0;
            table.pinned_status = None;
        }
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    pub async fn fail_next_create_topic(&self, error: ProviderError) {
        self.storage.lock().await.faults.create_topic = Some(error);
    }

    pub async fn fail_next_create_queue(&self, error: ProviderError) {
        self.storage.lock().await.faults.create_queue = Some(error);
    }

    pub async fn fail_next_create_table(&self, error: ProviderError) {
        self.storage.lock().await.faults.create_table = Some(error);
    }

    pub async fn fail_next_describe_table(&self, error: ProviderError) {
        self.storage.lock().await.faults.describe_table = Some(error);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub async fn call_counts(&self) -> CallCounts {
        self.storage.lock().await.calls
    }

    pub async fn create_table_calls(&self) -> usize {
        self.storage.lock().await.calls.create_table
    }

    pub async fn describe_table_calls(&self) -> usize {
        self.storage.lock().await.calls.describe_table
    }

    pub async fn create_queue_calls(&self) -> usize {
        self.storage.lock().await.calls.create_queue
    }

    pub async fn topic_count(&self) -> usize {
        self.storage.lock().await.topics.len()
    }

    /// Stored attributes and redrive policy of a queue, by name
    pub async fn queue_state(
        &self,
        region: &str,
        name: &str,
    ) -> Option<(QueueAttributes, Option<RedrivePolicy>)> {
        self.storage
            .lock()
            .await
            .queues
            .values()
            .find(|q| q.region == region && q.name == name)
            .map(|q| (q.attributes, q.redrive_policy.clone()))
    }
}

fn service_error(service: &str, code: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::Service {
        service: service.to_string(),
        code: code.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl TopicCatalog for InMemoryProvider {
    async fn list_topics(
        &self,
        region: &str,
        next_token: Option<String>,
    ) -> Result<TopicPage, ProviderError> {
        let mut storage = self.storage.lock().await;
        storage.calls.list_topics += 1;

        let offset = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                service_error("sns", "InvalidParameter", format!("Invalid NextToken '{}'", token))
            })?,
            None => 0,
        };

        let in_region: Vec<&String> = storage
            .topics
            .iter()
            .filter(|((topic_region, _), _)| topic_region == region)
            .map(|(_, arn)| arn)
            .collect();

        let page_size = self.config.page_size.max(1);
        let topic_arns = in_region
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|arn| arn.to_string())
            .collect();
        let next_offset = offset + page_size;
        let next_token = (next_offset < in_region.len()).then(|| next_offset.to_string());

        Ok(TopicPage {
            topic_arns,
            next_token,
        })
    }

    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError> {
        let arn = self.topic_arn(region, name);
        let mut storage = self.storage.lock().await;
        storage.calls.create_topic += 1;

        if let Some(error) = storage.faults.create_topic.take() {
            return Err(error);
        }

        Ok(storage
            .topics
            .entry((region.to_string(), name.to_string()))
            .or_insert(arn)
            .clone())
    }
}

#[async_trait]
impl QueueStore for InMemoryProvider {
    async fn get_queue_url(
        &self,
        region: &str,
        queue_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        let url = self.queue_url(region, queue_name);
        let mut storage = self.storage.lock().await;
        storage.calls.get_queue_url += 1;
        Ok(storage.queues.contains_key(&url).then_some(url))
    }

    async fn create_queue(
        &self,
        region: &str,
        queue_name: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<String, ProviderError> {
        let url = self.queue_url(region, queue_name);
        let mut storage = self.storage.lock().await;
        storage.calls.create_queue += 1;

        if let Some(error) = storage.faults.create_queue.take() {
            return Err(error);
        }

        if let Some(existing) = storage.queues.get(&url) {
            if existing.attributes != *attributes {
                return Err(service_error(
                    "sqs",
                    "QueueAlreadyExists",
                    format!("Queue '{}' exists with different attributes", queue_name),
                ));
            }
            return Ok(url);
        }

        storage.queues.insert(
            url.clone(),
            StoredQueue {
                region: region.to_string(),
                name: queue_name.to_string(),
                arn: self.queue_arn(region, queue_name),
                attributes: *attributes,
                redrive_policy: redrive_policy.cloned(),
            },
        );
        Ok(url)
    }

    async fn get_queue_attributes(
        &self,
        _region: &str,
        queue_url: &str,
    ) -> Result<RemoteQueueAttributes, ProviderError> {
        let mut storage = self.storage.lock().await;
        storage.calls.get_queue_attributes += 1;

        let queue = storage
            .queues
            .get(queue_url)
            .ok_or_else(|| ProviderError::NotFound {
                resource: format!("queue '{}'", queue_url),
            })?;

        Ok(RemoteQueueAttributes {
            arn: queue.arn.clone(),
            attributes: queue.attributes,
            redrive_policy: queue.redrive_policy.clone(),
        })
    }

    async fn set_queue_attributes(
        &self,
        _region: &str,
        queue_url: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<(), ProviderError> {
        let mut storage = self.storage.lock().await;
        storage.calls.set_queue_attributes += 1;

        let queue = storage
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| ProviderError::NotFound {
                resource: format!("queue '{}'", queue_url),
            })?;

        queue.attributes = *attributes;
        if let Some(policy) = redrive_policy {
            queue.redrive_policy = Some(policy.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for InMemoryProvider {
    async fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> Result<Option<TableDescription>, ProviderError> {
        let mut storage = self.storage.lock().await;
        storage.calls.describe_table += 1;

        if let Some(error) = storage.faults.describe_table.take() {
            return Err(error);
        }

        let Some(table) = storage
            .tables
            .get_mut(&(region.to_string(), table_name.to_string()))
        else {
            return Ok(None);
        };

        if table.hidden_remaining > 0 {
            table.hidden_remaining -= 1;
            return Ok(None);
        }

        let status = if let Some(status) = &table.pinned_status {
            status.clone()
        } else if table.creating_remaining > 0 {
            table.creating_remaining -= 1;
            TableStatus::Creating
        } else {
            TableStatus::Active
        };

        Ok(Some(TableDescription {
            name: table.spec.name.clone(),
            status,
            arn: Some(table.arn.clone()),
        }))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), ProviderError> {
        let key = (spec.region.clone(), spec.name.clone());
        let arn = self.table_arn(&spec.region, &spec.name);
        let mut storage = self.storage.lock().await;
        storage.calls.create_table += 1;

        if let Some(error) = storage.faults.create_table.take() {
            return Err(error);
        }

        if storage.tables.contains_key(&key) {
            return Err(service_error(
                "dynamodb",
                "ResourceInUseException",
                format!("Table already exists: {}", spec.name),
            ));
        }

        storage.tables.insert(
            key,
            StoredTable {
                spec: spec.clone(),
                arn,
                hidden_remaining: self.config.hidden_describes_after_create,
                creating_remaining: self.config.creating_describes_after_create,
                pinned_status: None,
            },
        );
        Ok(())
    }
}
