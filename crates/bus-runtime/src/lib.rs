//! # Bus Runtime
//!
//! Resource provisioning and assembly for a publish/subscribe messaging bus
//! built on managed topics, queues and tables.
//!
//! Given a region list, naming rules and retry settings, this library ensures
//! the topics, queues and coordination tables a bus needs exist, resolves
//! their ARNs and URLs, and returns a wired [`MessagingBus`]. Provisioning
//! tolerates eventually consistent providers and concurrent creators.
//!
//! ## Module Organization
//!
//! - [`config`] - Messaging configuration and region validation
//! - [`naming`] - Logical to physical resource names
//! - [`descriptor`] - Resource descriptors and queue attributes
//! - [`topic`] - Topic lookup and provisioning
//! - [`queue`] - Queue provisioning and attribute sync
//! - [`table`] - Coordination table provisioning
//! - [`provision`] - Outcomes, readiness policy and kind dispatch
//! - [`bus`] - The assembled bus and its injected collaborators
//! - [`assembler`] - Staged bus assembly
//! - [`settings`] - File and environment configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`providers`] - AWS and in-memory backends
//! - [`error`] - Error types

pub mod assembler;
pub mod bus;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod naming;
pub mod providers;
pub mod provision;
pub mod queue;
pub mod settings;
pub mod table;
pub mod topic;

// Re-export commonly used types at crate root for convenience
pub use assembler::{BusAssembler, BusSettings};
pub use bus::{
    JsonSerializationFactory, JsonSerializer, MessageMonitor, MessageSerializer, MessagingBus,
    NullMonitor, SerializationFactory, SerializationRegister,
};
pub use config::{validate_regions, MessagingConfig};
pub use descriptor::{QueueAttributes, RedrivePolicy, ResourceDescriptor, ResourceKind};
pub use error::{
    BusError, ConfigurationError, ProviderError, ProviderErrorClass, ProvisioningError,
    SerializationError,
};
pub use naming::{DefaultNamingStrategy, NamingStrategy, PrefixedNamingStrategy};
pub use providers::ResourceProvider;
pub use provision::{
    CancellationToken, ProviderSet, Provisioned, ProvisioningOutcome, ReadinessPolicy,
    ResourceProvisioner,
};
pub use queue::{QueueStore, RemoteQueue, RemoteQueueAttributes};
pub use settings::BusRuntimeSettings;
pub use table::{TableDescription, TableProvisioner, TableSpec, TableStatus, TableStore};
pub use topic::{TopicCatalog, TopicLocator, TopicPage};
