//! Resource provider implementations.
//!
//! This module contains concrete implementations of the [`TopicCatalog`],
//! [`QueueStore`] and [`TableStore`] traits for different backends.

use crate::queue::QueueStore;
use crate::table::TableStore;
use crate::topic::TopicCatalog;

pub mod aws;
pub mod memory;

pub use aws::{AwsProvider, AwsProviderConfig};
pub use memory::{InMemoryConfig, InMemoryProvider};

/// A backend offering every capability the provisioning layer consumes
pub trait ResourceProvider: TopicCatalog + QueueStore + TableStore {}

impl<T> ResourceProvider for T where T: TopicCatalog + QueueStore + TableStore {}
