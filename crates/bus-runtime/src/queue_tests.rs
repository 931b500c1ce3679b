//! Tests for queue provisioning and attribute sync.

use super::*;
use crate::descriptor::{DEFAULT_ERROR_QUEUE_RETENTION_PERIOD_SECONDS, ERROR_QUEUE_SUFFIX};
use crate::providers::memory::InMemoryProvider;

const REGION: &str = "eu-west-1";

fn slow_attributes() -> QueueAttributes {
    QueueAttributes {
        visibility_timeout_seconds: 300,
        ..QueueAttributes::default()
    }
}

// ============================================================================
// ensure_queue
// ============================================================================

mod ensure_queue {
    use super::*;

    /// Verify a new queue is created and fully resolved
    #[tokio::test]
    async fn test_missing_queue_is_created() {
        let provider = InMemoryProvider::default();

        let provisioned = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue(REGION, "orders"),
            &Span::none(),
        )
        .await
        .unwrap();

        assert_eq!(provisioned.outcome, ProvisioningOutcome::Created);
        assert!(provisioned.descriptor.is_resolved());
        assert_eq!(
            provisioned.descriptor.url(),
            Some(provider.queue_url(REGION, "orders").as_str())
        );
        assert_eq!(
            provisioned.descriptor.arn(),
            Some(provider.queue_arn(REGION, "orders").as_str())
        );
    }

    /// Verify the error queue is created first and wired via redrive
    #[tokio::test]
    async fn test_error_queue_and_redrive() {
        let provider = InMemoryProvider::default();

        let provisioned = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue_with_error_queue(REGION, "orders"),
            &Span::none(),
        )
        .await
        .unwrap();

        let error_name = format!("orders{}", ERROR_QUEUE_SUFFIX);
        let error_queue = provisioned.descriptor.error_resource().unwrap();
        assert_eq!(error_queue.name(), error_name);
        assert!(error_queue.is_resolved());
        assert_eq!(
            error_queue.message_retention_seconds(),
            DEFAULT_ERROR_QUEUE_RETENTION_PERIOD_SECONDS
        );

        let expected_policy =
            RedrivePolicy::new(DEFAULT_MAX_RECEIVE_COUNT, provider.queue_arn(REGION, &error_name));
        assert_eq!(
            provisioned.descriptor.redrive_policy(),
            Some(&expected_policy)
        );

        let (_, stored_policy) = provider.queue_state(REGION, "orders").await.unwrap();
        assert_eq!(stored_policy, Some(expected_policy));
    }

    /// Verify an explicit redrive policy is not replaced
    #[tokio::test]
    async fn test_explicit_redrive_policy_is_kept() {
        let provider = InMemoryProvider::default();
        let policy = RedrivePolicy::new(10, "arn:aws:sqs:eu-west-1:000000000000:shared_dlq");

        let provisioned = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue_with_error_queue(REGION, "orders")
                .with_redrive_policy(policy.clone()),
            &Span::none(),
        )
        .await
        .unwrap();

        assert_eq!(provisioned.descriptor.redrive_policy(), Some(&policy));
    }

    /// Verify an existing queue is found and its drifted attributes pushed
    #[tokio::test]
    async fn test_existing_queue_is_updated() {
        let provider = InMemoryProvider::default();
        provider
            .add_queue(REGION, "orders", QueueAttributes::default(), None)
            .await;

        let provisioned = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue(REGION, "orders").with_attributes(slow_attributes()),
            &Span::none(),
        )
        .await
        .unwrap();

        assert_eq!(provisioned.outcome, ProvisioningOutcome::Found);
        assert_eq!(provider.create_queue_calls().await, 0);
        assert_eq!(
            provider.queue_state(REGION, "orders").await,
            Some((slow_attributes(), None))
        );
    }

    /// Verify an existing queue in step with the descriptor is left alone
    #[tokio::test]
    async fn test_existing_queue_without_drift() {
        let provider = InMemoryProvider::default();
        let policy = RedrivePolicy::new(5, "arn:dlq");
        provider
            .add_queue(REGION, "orders", QueueAttributes::default(), Some(policy.clone()))
            .await;

        let provisioned = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue(REGION, "orders"),
            &Span::none(),
        )
        .await
        .unwrap();

        assert_eq!(provisioned.outcome, ProvisioningOutcome::Found);
        assert_eq!(provider.call_counts().await.set_queue_attributes, 0);
        // Adopted from the provider since none was requested
        assert_eq!(provisioned.descriptor.redrive_policy(), Some(&policy));
    }

    /// Verify a conflicting create is a lost race followed by a lookup
    #[tokio::test]
    async fn test_conflicting_create_is_race_lost() {
        let provider = InMemoryProvider::default();
        provider
            .add_queue(REGION, "orders", QueueAttributes::default(), None)
            .await;
        let conflict = ProviderError::Service {
            service: "sqs".to_string(),
            code: "QueueAlreadyExists".to_string(),
            message: "exists".to_string(),
        };
        let store = RacingStore {
            inner: provider,
            conflict,
        };

        let provisioned = super::super::ensure_queue(
            &store,
            ResourceDescriptor::queue(REGION, "orders"),
            &Span::none(),
        )
        .await
        .unwrap();

        assert_eq!(provisioned.outcome, ProvisioningOutcome::RaceLost);
        assert!(provisioned.descriptor.is_resolved());
    }

    /// Verify other create failures are surfaced
    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let provider = InMemoryProvider::default();
        provider
            .fail_next_create_queue(ProviderError::AuthenticationFailed {
                message: "denied".to_string(),
            })
            .await;

        let result = super::super::ensure_queue(
            &provider,
            ResourceDescriptor::queue(REGION, "orders"),
            &Span::none(),
        )
        .await;

        assert!(matches!(
            result,
            Err(ProvisioningError::Provider(
                ProviderError::AuthenticationFailed { .. }
            ))
        ));
    }

    /// Store whose first lookup misses an existing queue, as when another
    /// caller creates it between lookup and create.
    struct RacingStore {
        inner: InMemoryProvider,
        conflict: ProviderError,
    }

    #[async_trait]
    impl QueueStore for RacingStore {
        async fn get_queue_url(
            &self,
            region: &str,
            queue_name: &str,
        ) -> Result<Option<String>, ProviderError> {
            let calls = self.inner.call_counts().await.create_queue;
            if calls == 0 {
                self.inner
                    .fail_next_create_queue(self.conflict.clone())
                    .await;
                return Ok(None);
            }
            self.inner.get_queue_url(region, queue_name).await
        }

        async fn create_queue(
            &self,
            region: &str,
            queue_name: &str,
            attributes: &QueueAttributes,
            redrive_policy: Option<&RedrivePolicy>,
        ) -> Result<String, ProviderError> {
            self.inner
                .create_queue(region, queue_name, attributes, redrive_policy)
                .await
        }

        async fn get_queue_attributes(
            &self,
            region: &str,
            queue_url: &str,
        ) -> Result<RemoteQueueAttributes, ProviderError> {
            self.inner.get_queue_attributes(region, queue_url).await
        }

        async fn set_queue_attributes(
            &self,
            region: &str,
            queue_url: &str,
            attributes: &QueueAttributes,
            redrive_policy: Option<&RedrivePolicy>,
        ) -> Result<(), ProviderError> {
            self.inner
                .set_queue_attributes(region, queue_url, attributes, redrive_policy)
                .await
        }
    }
}

// ============================================================================
// RemoteQueue
// ============================================================================

mod remote_queue {
    use super::*;

    async fn seeded() -> Arc<InMemoryProvider> {
        let provider = Arc::new(InMemoryProvider::default());
        provider
            .add_queue(
                REGION,
                "orders",
                slow_attributes(),
                Some(RedrivePolicy::new(3, "arn:dlq")),
            )
            .await;
        provider
    }

    /// Verify refresh pulls identity and attributes from the provider
    #[tokio::test]
    async fn test_refresh() {
        let provider = seeded().await;
        let mut queue = RemoteQueue::new(provider.clone(), ResourceDescriptor::queue(REGION, "orders"));

        assert!(queue.exists().await.unwrap());
        queue.refresh().await.unwrap();

        let descriptor = queue.descriptor();
        assert!(descriptor.is_resolved());
        assert_eq!(descriptor.visibility_timeout_seconds(), 300);
        assert_eq!(
            descriptor.redrive_policy(),
            Some(&RedrivePolicy::new(3, "arn:dlq"))
        );
    }

    /// Verify refreshing a missing queue is a not-found error
    #[tokio::test]
    async fn test_refresh_missing_queue() {
        let provider = Arc::new(InMemoryProvider::default());
        let mut queue = RemoteQueue::new(provider, ResourceDescriptor::queue(REGION, "orders"));

        assert!(!queue.exists().await.unwrap());
        assert!(matches!(
            queue.refresh().await,
            Err(ProviderError::NotFound { .. })
        ));
        assert!(!queue.descriptor().is_resolved());
    }

    /// Verify updates are only pushed when the attributes differ
    #[tokio::test]
    async fn test_update_only_when_different() {
        let provider = seeded().await;
        let mut queue = RemoteQueue::new(provider.clone(), ResourceDescriptor::queue(REGION, "orders"));
        queue.refresh().await.unwrap();

        assert!(!queue.needs_update(&slow_attributes()));
        assert!(!queue.update_attributes(slow_attributes()).await.unwrap());
        assert_eq!(provider.call_counts().await.set_queue_attributes, 0);

        let desired = QueueAttributes {
            delivery_delay_seconds: 10,
            ..slow_attributes()
        };
        assert!(queue.needs_update(&desired));
        assert!(queue.update_attributes(desired).await.unwrap());
        assert_eq!(queue.descriptor().delivery_delay_seconds(), 10);

        let (stored, policy) = provider.queue_state(REGION, "orders").await.unwrap();
        assert_eq!(stored, desired);
        assert_eq!(policy, Some(RedrivePolicy::new(3, "arn:dlq")));
    }

    /// Verify a failed update leaves the local copy unchanged
    #[tokio::test]
    async fn test_failed_update_keeps_local_copy() {
        let provider = Arc::new(InMemoryProvider::default());
        let descriptor = ResourceDescriptor::queue(REGION, "orders");
        let mut queue = RemoteQueue::new(provider, descriptor.clone());

        let result = queue.update_attributes(slow_attributes()).await;

        assert!(matches!(result, Err(ProviderError::NotFound { .. })));
        assert_eq!(queue.into_descriptor(), descriptor);
    }
}
