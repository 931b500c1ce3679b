//! End-to-end assembly of a bus from settings against a mocked provider

mod common;

use bus_runtime::settings::{BusRuntimeSettings, MessagingSettings, ReadinessSettings};
use bus_runtime::{
    BusError, ConfigurationError, PrefixedNamingStrategy, ProvisioningOutcome, TableSpec,
};
use common::*;
use wiremock::matchers::query_param;
use wiremock::MockServer;

fn settings(server: &MockServer) -> BusRuntimeSettings {
    BusRuntimeSettings {
        messaging: MessagingSettings {
            regions: vec![REGION.to_string(), "us-east-1".to_string()],
            ..MessagingSettings::default()
        },
        aws: provider_config(server),
        table_readiness: ReadinessSettings {
            initial_interval_ms: 10,
            backoff_multiplier: 2.0,
            max_interval_ms: 50,
            max_wait_seconds: 5,
        },
        ..BusRuntimeSettings::default()
    }
}

/// Verify a bus assembled from settings provisions topics and tables
#[tokio::test]
async fn test_assembled_bus_provisions_resources() {
    let server = MockServer::start().await;

    action("ListTopics")
        .respond_with(xml(list_topics_xml(&[topic_arn("CustomerCreated")], None)))
        .mount(&server)
        .await;
    action("CreateTopic")
        .and(query_param("Name", "uat-OrderPlaced"))
        .respond_with(xml(create_topic_xml(&topic_arn("uat-OrderPlaced"))))
        .expect(1)
        .mount(&server)
        .await;
    dynamodb("DescribeTable")
        .respond_with(table_description("uat-locks", "ACTIVE"))
        .mount(&server)
        .await;
    dynamodb("CreateTable")
        .respond_with(table_description("uat-locks", "CREATING"))
        .expect(0)
        .mount(&server)
        .await;

    let bus = settings(&server)
        .assemble()
        .unwrap()
        .with_naming_strategy(PrefixedNamingStrategy::new("uat"))
        .build()
        .unwrap();

    let topic = bus.ensure_topic_for("OrderPlaced").await.unwrap();
    assert_eq!(topic.outcome, ProvisioningOutcome::Created);
    assert_eq!(
        topic.descriptor.arn(),
        Some(topic_arn("uat-OrderPlaced").as_str())
    );
    assert!(bus.serialization_register().is_registered("OrderPlaced"));

    let table = bus
        .ensure_table(&TableSpec::with_hash_key(REGION, "uat-locks", "Id"))
        .await
        .unwrap();
    assert_eq!(table.outcome, ProvisioningOutcome::Found);
    assert_eq!(table.descriptor.arn(), Some(table_arn("uat-locks").as_str()));
}

/// Verify an existing topic is reused rather than created again
#[tokio::test]
async fn test_assembled_bus_finds_existing_topic() {
    let server = MockServer::start().await;

    action("ListTopics")
        .respond_with(xml(list_topics_xml(&[topic_arn("OrderPlaced")], None)))
        .mount(&server)
        .await;
    action("CreateTopic")
        .respond_with(xml(create_topic_xml(&topic_arn("OrderPlaced"))))
        .expect(0)
        .mount(&server)
        .await;

    let bus = settings(&server).assemble().unwrap().build().unwrap();

    let topic = bus.ensure_topic_for("OrderPlaced").await.unwrap();

    assert_eq!(topic.outcome, ProvisioningOutcome::Found);
    assert!(bus
        .topic_exists(REGION, &topic_arn("OrderPlaced"))
        .await
        .unwrap());
}

/// Verify invalid settings fail before any request is made
#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let server = MockServer::start().await;
    let mut settings = settings(&server);
    settings.messaging.regions.push(REGION.to_string());

    let result = settings.assemble();

    assert!(matches!(
        result,
        Err(BusError::Configuration(ConfigurationError::DuplicateRegion { .. }))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
