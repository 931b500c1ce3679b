//! Coordination table provisioning over the DynamoDB JSON API

mod common;

use bus_runtime::{
    ProviderSet, ProvisioningError, ProvisioningOutcome, ReadinessPolicy, ResourceProvisioner,
    TableSpec, TableStatus, TableStore,
};
use common::*;
use std::time::Duration;
use wiremock::matchers::body_json;
use wiremock::{MockServer, ResponseTemplate};

fn provisioner(server: &MockServer) -> ResourceProvisioner {
    ResourceProvisioner::new(ProviderSet::from_provider(provider(server))).with_readiness_policy(
        ReadinessPolicy::fixed(Duration::from_millis(10), Duration::from_secs(2)),
    )
}

/// Verify a missing table is reported as absent rather than an error
#[tokio::test]
async fn test_describe_missing_table() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .and(body_json(serde_json::json!({"TableName": "locks"})))
        .respond_with(json_error(
            "ResourceNotFoundException",
            "Requested resource not found",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let table = provider(&server).describe_table(REGION, "locks").await.unwrap();

    assert!(table.is_none());
}

/// Verify the table description is parsed
#[tokio::test]
async fn test_describe_table() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .respond_with(table_description("locks", "UPDATING"))
        .mount(&server)
        .await;

    let table = provider(&server)
        .describe_table(REGION, "locks")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(table.name, "locks");
    assert_eq!(table.status, TableStatus::Updating);
    assert_eq!(table.arn, Some(table_arn("locks")));
}

/// Verify a missing table is created and polled until active
#[tokio::test]
async fn test_ensure_creates_and_waits() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .respond_with(json_error("ResourceNotFoundException", "not found"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    dynamodb("DescribeTable")
        .respond_with(table_description("locks", "CREATING"))
        .up_to_n_times(2)
        .with_priority(2)
        .mount(&server)
        .await;
    dynamodb("DescribeTable")
        .respond_with(table_description("locks", "ACTIVE"))
        .mount(&server)
        .await;
    dynamodb("CreateTable")
        .and(body_json(serde_json::json!({
            "TableName": "locks",
            "AttributeDefinitions": [{"AttributeName": "Id", "AttributeType": "S"}],
            "KeySchema": [{"AttributeName": "Id", "KeyType": "HASH"}],
            "ProvisionedThroughput": {"ReadCapacityUnits": 10, "WriteCapacityUnits": 10}
        })))
        .respond_with(table_description("locks", "CREATING"))
        .expect(1)
        .mount(&server)
        .await;

    let spec = TableSpec::with_hash_key(REGION, "locks", "Id").with_throughput(10, 10);
    let provisioned = provisioner(&server).ensure_table(&spec).await.unwrap();

    assert_eq!(provisioned.outcome, ProvisioningOutcome::Created);
    assert_eq!(
        provisioned.descriptor.arn(),
        Some(table_arn("locks").as_str())
    );
}

/// Verify a concurrent create by another caller is a lost race
#[tokio::test]
async fn test_ensure_resource_in_use() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .respond_with(json_error("ResourceNotFoundException", "not found"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    dynamodb("DescribeTable")
        .respond_with(table_description("locks", "CREATING"))
        .mount(&server)
        .await;
    dynamodb("CreateTable")
        .respond_with(json_error(
            "ResourceInUseException",
            "Table already exists: locks",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let spec = TableSpec::with_hash_key(REGION, "locks", "Id");
    let provisioned = provisioner(&server).ensure_table(&spec).await.unwrap();

    assert_eq!(provisioned.outcome, ProvisioningOutcome::RaceLost);
}

/// Verify other create failures are surfaced
#[tokio::test]
async fn test_ensure_create_rejected() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .respond_with(json_error("ResourceNotFoundException", "not found"))
        .mount(&server)
        .await;
    dynamodb("CreateTable")
        .respond_with(json_error("ValidationException", "bad key schema"))
        .mount(&server)
        .await;

    let spec = TableSpec::with_hash_key(REGION, "locks", "Id");
    let result = provisioner(&server).ensure_table(&spec).await;

    assert!(matches!(result, Err(ProvisioningError::Provider(_))));
}

/// Verify a table stuck in creation times out
#[tokio::test]
async fn test_ensure_times_out() {
    let server = MockServer::start().await;

    dynamodb("DescribeTable")
        .respond_with(json_error("ResourceNotFoundException", "not found"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    dynamodb("DescribeTable")
        .respond_with(table_description("locks", "CREATING"))
        .mount(&server)
        .await;
    dynamodb("CreateTable")
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let provisioner = ResourceProvisioner::new(ProviderSet::from_provider(provider(&server)))
        .with_readiness_policy(ReadinessPolicy::fixed(
            Duration::from_millis(20),
            Duration::from_millis(100),
        ));
    let spec = TableSpec::with_hash_key(REGION, "locks", "Id");
    let result = provisioner.ensure_table(&spec).await;

    assert!(matches!(result, Err(ProvisioningError::Timeout { .. })));
}
