//! Queue provisioning and provider-backed attribute sync.
//!
//! [`ensure_queue`] resolves a queue descriptor against the provider, creating
//! its error queue first so the redrive policy can point at it.
//! [`RemoteQueue`] keeps a descriptor in step with the provider; syncing is
//! explicit through [`RemoteQueue::refresh`] and
//! [`RemoteQueue::update_attributes`].

use crate::descriptor::{
    QueueAttributes, RedrivePolicy, ResourceDescriptor, ResourceKind, DEFAULT_MAX_RECEIVE_COUNT,
};
use crate::error::{ProviderError, ProviderErrorClass, ProvisioningError};
use crate::provision::{Provisioned, ProvisioningOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn, Span};

/// Attributes of a queue as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteQueueAttributes {
    pub arn: String,
    pub attributes: QueueAttributes,
    pub redrive_policy: Option<RedrivePolicy>,
}

/// Queue operations consumed from the remote provider
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Resolve a queue URL by name; `Ok(None)` when the queue does not exist
    async fn get_queue_url(
        &self,
        region: &str,
        queue_name: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Create a queue, returning its URL
    async fn create_queue(
        &self,
        region: &str,
        queue_name: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<String, ProviderError>;

    async fn get_queue_attributes(
        &self,
        region: &str,
        queue_url: &str,
    ) -> Result<RemoteQueueAttributes, ProviderError>;

    /// Overwrite queue attributes. A `None` redrive policy leaves the
    /// current one in place.
    async fn set_queue_attributes(
        &self,
        region: &str,
        queue_url: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<(), ProviderError>;
}

/// A queue descriptor bound to the provider that owns the queue
pub struct RemoteQueue {
    descriptor: ResourceDescriptor,
    store: Arc<dyn QueueStore>,
    span: Span,
}

impl RemoteQueue {
    pub fn new(store: Arc<dyn QueueStore>, descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            store,
            span: Span::current(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> ResourceDescriptor {
        self.descriptor
    }

    /// Check whether the queue exists on the provider
    pub async fn exists(&self) -> Result<bool, ProviderError> {
        Ok(self
            .store
            .get_queue_url(self.descriptor.region(), self.descriptor.name())
            .await?
            .is_some())
    }

    /// Pull identity and attributes from the provider into the descriptor
    pub async fn refresh(&mut self) -> Result<(), ProviderError> {
        let url = self.resolve_url().await?;
        let remote = self
            .store
            .get_queue_attributes(self.descriptor.region(), &url)
            .await?;

        self.descriptor.set_arn(remote.arn);
        self.descriptor.set_attributes(remote.attributes);
        self.descriptor.set_redrive_policy(remote.redrive_policy);

        debug!(
            parent: &self.span,
            queue = self.descriptor.name(),
            queue_url = %url,
            "Queue attributes refreshed"
        );
        Ok(())
    }

    /// Check whether `desired` differs from the local copy
    pub fn needs_update(&self, desired: &QueueAttributes) -> bool {
        self.descriptor.attributes() != desired
    }

    /// Push `desired` to the provider when it differs from the local copy.
    ///
    /// Returns whether a request was made. The local copy only changes once
    /// the provider has accepted the update.
    pub async fn update_attributes(
        &mut self,
        desired: QueueAttributes,
    ) -> Result<bool, ProviderError> {
        if !self.needs_update(&desired) {
            return Ok(false);
        }

        let url = self.resolve_url().await?;
        self.store
            .set_queue_attributes(self.descriptor.region(), &url, &desired, None)
            .await?;
        self.descriptor.set_attributes(desired);

        info!(
            parent: &self.span,
            queue = self.descriptor.name(),
            retention_seconds = desired.message_retention_seconds,
            visibility_timeout_seconds = desired.visibility_timeout_seconds,
            delivery_delay_seconds = desired.delivery_delay_seconds,
            "Queue attributes updated"
        );
        Ok(true)
    }

    async fn resolve_url(&mut self) -> Result<String, ProviderError> {
        if let Some(url) = self.descriptor.url() {
            return Ok(url.to_string());
        }

        let url = self
            .store
            .get_queue_url(self.descriptor.region(), self.descriptor.name())
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                resource: self.descriptor.to_string(),
            })?;
        self.descriptor.set_url(url.clone());
        Ok(url)
    }
}

/// Ensure a queue, and its error queue when one is linked, exist.
///
/// The error queue is provisioned first. When the descriptor has no redrive
/// policy of its own, one pointing at the error queue is attached with
/// [`DEFAULT_MAX_RECEIVE_COUNT`].
pub async fn ensure_queue(
    store: &dyn QueueStore,
    mut descriptor: ResourceDescriptor,
    span: &Span,
) -> Result<Provisioned, ProvisioningError> {
    debug_assert_eq!(descriptor.kind(), ResourceKind::Queue);

    if let Some(mut error_queue) = descriptor.take_error_resource() {
        ensure_single_queue(store, &mut error_queue, span).await?;
        if descriptor.redrive_policy().is_none() {
            if let Some(arn) = error_queue.arn() {
                descriptor
                    .set_redrive_policy(Some(RedrivePolicy::new(DEFAULT_MAX_RECEIVE_COUNT, arn)));
            }
        }
        descriptor.set_error_resource(Some(error_queue));
    }

    let outcome = ensure_single_queue(store, &mut descriptor, span).await?;

    Ok(Provisioned {
        outcome,
        descriptor,
    })
}

async fn ensure_single_queue(
    store: &dyn QueueStore,
    descriptor: &mut ResourceDescriptor,
    span: &Span,
) -> Result<ProvisioningOutcome, ProvisioningError> {
    let region = descriptor.region().to_string();
    let name = descriptor.name().to_string();

    let (outcome, url) = match store.get_queue_url(&region, &name).await? {
        Some(url) => (ProvisioningOutcome::Found, url),
        None => match store
            .create_queue(
                &region,
                &name,
                descriptor.attributes(),
                descriptor.redrive_policy(),
            )
            .await
        {
            Ok(url) => {
                info!(parent: span, queue = %name, region = %region, queue_url = %url, "Created queue");
                (ProvisioningOutcome::Created, url)
            }
            Err(e) if e.class() == ProviderErrorClass::Conflict => {
                warn!(
                    parent: span,
                    queue = %name,
                    error = %e,
                    "Queue is being created by another caller"
                );
                let url = store
                    .get_queue_url(&region, &name)
                    .await?
                    .ok_or_else(|| ProviderError::NotFound {
                        resource: descriptor.to_string(),
                    })?;
                (ProvisioningOutcome::RaceLost, url)
            }
            Err(e) => return Err(e.into()),
        },
    };

    descriptor.set_url(url.clone());
    let remote = store.get_queue_attributes(&region, &url).await?;
    descriptor.set_arn(remote.arn);

    match outcome {
        ProvisioningOutcome::Found => {
            let desired_redrive = descriptor.redrive_policy().cloned();
            let redrive_differs =
                desired_redrive.is_some() && desired_redrive != remote.redrive_policy;
            if remote.attributes != *descriptor.attributes() || redrive_differs {
                let redrive = if redrive_differs {
                    desired_redrive.as_ref()
                } else {
                    None
                };
                store
                    .set_queue_attributes(&region, &url, descriptor.attributes(), redrive)
                    .await?;
                info!(parent: span, queue = %name, "Existing queue attributes updated");
            }
            if desired_redrive.is_none() {
                descriptor.set_redrive_policy(remote.redrive_policy);
            }
        }
        ProvisioningOutcome::Created | ProvisioningOutcome::RaceLost => {
            // Whoever created the queue decided its attributes.
            descriptor.set_attributes(remote.attributes);
            descriptor.set_redrive_policy(remote.redrive_policy);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
