//! Tests for the assembled bus and its collaborators.

use super::*;
use crate::assembler::BusAssembler;
use crate::descriptor::QueueAttributes;
use crate::naming::PrefixedNamingStrategy;
use crate::provision::{ProvisioningOutcome, ReadinessPolicy};
use crate::providers::memory::InMemoryProvider;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: u64,
    customer: String,
}

fn bus_with(provider: Arc<InMemoryProvider>) -> MessagingBus {
    BusAssembler::in_regions(["eu-west-1", "us-east-1"])
        .unwrap()
        .with_provider(provider)
        .with_readiness_policy(ReadinessPolicy::fixed(
            Duration::from_secs(1),
            Duration::from_secs(30),
        ))
        .build()
        .unwrap()
}

// ============================================================================
// Serialization
// ============================================================================

mod serialization {
    use super::*;

    /// Verify registered types round through the JSON serializer
    #[test]
    fn test_register_serialize_deserialize() {
        let register = SerializationRegister::new();
        register.add_serializer("OrderPlaced", Arc::new(JsonSerializer));

        let message = OrderPlaced {
            order_id: 42,
            customer: "ada".to_string(),
        };
        let payload = register.serialize("OrderPlaced", &message).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&payload).unwrap(),
            serde_json::json!({"order_id": 42, "customer": "ada"})
        );

        let decoded: OrderPlaced = register.deserialize("OrderPlaced", &payload).unwrap();
        assert_eq!(decoded, message);
    }

    /// Verify unregistered types are rejected
    #[test]
    fn test_unknown_message_type() {
        let register = SerializationRegister::new();
        let result = register.serialize("OrderPlaced", &serde_json::json!({}));

        assert!(matches!(
            result,
            Err(SerializationError::UnknownMessageType { message_type }) if message_type == "OrderPlaced"
        ));
    }

    /// Verify malformed payloads surface as JSON errors
    #[test]
    fn test_malformed_payload() {
        let register = SerializationRegister::new();
        register.add_serializer("OrderPlaced", Arc::new(JsonSerializer));

        let result: Result<OrderPlaced, _> = register.deserialize("OrderPlaced", "{not json");
        assert!(matches!(result, Err(SerializationError::JsonError(_))));
    }

    /// Verify the first registration for a type wins
    #[test]
    fn test_first_registration_wins() {
        struct Upper;
        impl MessageSerializer for Upper {
            fn serialize(&self, message: &serde_json::Value) -> Result<String, SerializationError> {
                Ok(message.to_string().to_uppercase())
            }
            fn deserialize(&self, payload: &str) -> Result<serde_json::Value, SerializationError> {
                Ok(serde_json::from_str(payload)?)
            }
        }

        let register = SerializationRegister::new();
        register.add_serializer("Ping", Arc::new(JsonSerializer));
        register.add_serializer("Ping", Arc::new(Upper));

        let payload = register.serialize("Ping", &serde_json::json!({"a": "b"})).unwrap();
        assert_eq!(payload, r#"{"a":"b"}"#);
        assert_eq!(register.message_types(), vec!["Ping".to_string()]);
    }
}

// ============================================================================
// Monitoring
// ============================================================================

/// Verify monitors only need to implement what they record
#[test]
fn test_partial_monitor() {
    #[derive(Default)]
    struct FailureCounter(AtomicUsize);
    impl MessageMonitor for FailureCounter {
        fn publish_failed(&self, _message_type: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let monitor = FailureCounter::default();
    monitor.publish_time("OrderPlaced", Duration::from_millis(5));
    monitor.publish_failed("OrderPlaced");
    monitor.throttled(Duration::from_millis(1));
    assert_eq!(monitor.0.load(Ordering::SeqCst), 1);

    NullMonitor.handle_failed("OrderPlaced");
}

// ============================================================================
// MessagingBus
// ============================================================================

mod messaging_bus {
    use super::*;

    /// Verify topics are provisioned in the active region under the naming strategy
    #[tokio::test]
    async fn test_ensure_topic_for() {
        let provider = Arc::new(InMemoryProvider::default());
        let bus = BusAssembler::in_regions(["eu-west-1"])
            .unwrap()
            .with_naming_strategy(PrefixedNamingStrategy::new("uat"))
            .with_provider(provider.clone())
            .build()
            .unwrap();

        let provisioned = bus.ensure_topic_for("OrderPlaced").await.unwrap();

        assert_eq!(provisioned.outcome, ProvisioningOutcome::Created);
        assert_eq!(provisioned.descriptor.name(), "uat-OrderPlaced");
        assert!(bus.serialization_register().is_registered("OrderPlaced"));

        let arn = provisioned.descriptor.arn().unwrap();
        assert!(bus.topic_exists("eu-west-1", arn).await.unwrap());
        assert!(!bus.topic_exists("us-east-1", arn).await.unwrap());
    }

    /// Verify topics can be provisioned in every configured region
    #[tokio::test]
    async fn test_ensure_topics_for_all_regions() {
        let provider = Arc::new(InMemoryProvider::default());
        let bus = bus_with(provider.clone());

        let provisioned = bus.ensure_topics_for("OrderPlaced").await.unwrap();

        let regions: Vec<&str> = provisioned.iter().map(|p| p.descriptor.region()).collect();
        assert_eq!(regions, vec!["eu-west-1", "us-east-1"]);
        assert_eq!(provider.topic_count().await, 2);
    }

    /// Verify subscriber queues come with an error queue
    #[tokio::test]
    async fn test_ensure_queue() {
        let provider = Arc::new(InMemoryProvider::default());
        let bus = bus_with(provider.clone());

        let provisioned = bus.ensure_queue("order-service", "OrderPlaced").await.unwrap();

        assert_eq!(provisioned.descriptor.name(), "order-service");
        assert_eq!(provisioned.descriptor.region(), "eu-west-1");
        assert!(provisioned.descriptor.redrive_policy().is_some());
        assert_eq!(
            provisioned.descriptor.error_resource().map(|e| e.name()),
            Some("order-service_error")
        );
    }

    /// Verify the bus hands out provider-backed queues
    #[tokio::test]
    async fn test_remote_queue() {
        let provider = Arc::new(InMemoryProvider::default());
        let bus = bus_with(provider.clone());
        let provisioned = bus.ensure_queue("order-service", "OrderPlaced").await.unwrap();

        let mut queue = bus.remote_queue(provisioned.descriptor);
        let desired = QueueAttributes {
            visibility_timeout_seconds: 120,
            ..QueueAttributes::default()
        };
        assert!(queue.update_attributes(desired).await.unwrap());

        let (stored, _) = provider
            .queue_state("eu-west-1", "order-service")
            .await
            .unwrap();
        assert_eq!(stored.visibility_timeout_seconds, 120);
    }

    /// Verify coordination tables are provisioned through the bus
    #[tokio::test(start_paused = true)]
    async fn test_ensure_table() {
        let provider = Arc::new(InMemoryProvider::default());
        let bus = bus_with(provider.clone());
        let spec = TableSpec::with_hash_key("eu-west-1", "locks", "Id");

        let first = bus.ensure_table(&spec).await.unwrap();
        let second = bus.ensure_table(&spec).await.unwrap();

        assert_eq!(first.outcome, ProvisioningOutcome::Created);
        assert_eq!(second.outcome, ProvisioningOutcome::Found);
        assert_eq!(provider.create_table_calls().await, 1);
    }

    /// Verify a selector drifting outside the configured regions is reported
    #[tokio::test]
    async fn test_active_region_drift() {
        let selected = Arc::new(std::sync::Mutex::new("eu-west-1".to_string()));
        let selector = selected.clone();
        let bus = BusAssembler::in_regions(["eu-west-1"])
            .unwrap()
            .with_active_region(move || selector.lock().unwrap().clone())
            .with_provider(Arc::new(InMemoryProvider::default()))
            .build()
            .unwrap();

        *selected.lock().unwrap() = "ap-south-1".to_string();

        let result = bus.ensure_topic_for("OrderPlaced").await;
        assert!(matches!(
            result,
            Err(BusError::Configuration(ConfigurationError::UnknownActiveRegion { .. }))
        ));
    }
}
