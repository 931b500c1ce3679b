//! Common test utilities for bus-runtime integration tests
//!
//! This module provides:
//! - An [`AwsProvider`] pointed at a local mock server
//! - Response bodies in the shape the query and JSON APIs return
//! - Matchers for query API actions and DynamoDB targets

use bus_runtime::providers::{AwsProvider, AwsProviderConfig};
use std::sync::Arc;
use wiremock::matchers::{header, method, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

pub const REGION: &str = "eu-west-1";
pub const ACCOUNT: &str = "123456789012";

// ============================================================================
// Provider
// ============================================================================

#[allow(dead_code)]
pub fn provider_config(server: &MockServer) -> AwsProviderConfig {
    AwsProviderConfig {
        access_key_id: Some("AKIDEXAMPLE".to_string()),
        secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
        session_token: None,
        endpoint_url: Some(server.uri()),
        request_timeout_seconds: 5,
    }
}

#[allow(dead_code)]
pub fn provider(server: &MockServer) -> Arc<AwsProvider> {
    Arc::new(AwsProvider::new(provider_config(server)).expect("provider should build"))
}

// ============================================================================
// Request matchers
// ============================================================================

/// Mock for a query API action (SNS, SQS)
#[allow(dead_code)]
pub fn action(name: &str) -> MockBuilder {
    Mock::given(method("POST")).and(query_param("Action", name))
}

/// Mock for a DynamoDB JSON API action
#[allow(dead_code)]
pub fn dynamodb(name: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(header("x-amz-target", format!("DynamoDB_20120810.{}", name).as_str()))
        .and(header("content-type", "application/x-amz-json-1.0"))
}

// ============================================================================
// Response bodies
// ============================================================================

#[allow(dead_code)]
pub fn topic_arn(name: &str) -> String {
    format!("arn:aws:sns:{}:{}:{}", REGION, ACCOUNT, name)
}

#[allow(dead_code)]
pub fn queue_url(name: &str) -> String {
    format!("https://sqs.{}.amazonaws.com/{}/{}", REGION, ACCOUNT, name)
}

#[allow(dead_code)]
pub fn queue_arn(name: &str) -> String {
    format!("arn:aws:sqs:{}:{}:{}", REGION, ACCOUNT, name)
}

#[allow(dead_code)]
pub fn table_arn(name: &str) -> String {
    format!("arn:aws:dynamodb:{}:{}:table/{}", REGION, ACCOUNT, name)
}

#[allow(dead_code)]
pub fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/xml")
}

#[allow(dead_code)]
pub fn list_topics_xml(arns: &[String], next_token: Option<&str>) -> String {
    let members: String = arns
        .iter()
        .map(|arn| format!("<member><TopicArn>{}</TopicArn></member>", arn))
        .collect();
    let token = next_token
        .map(|t| format!("<NextToken>{}</NextToken>", t))
        .unwrap_or_default();
    format!(
        "<ListTopicsResponse><ListTopicsResult><Topics>{}</Topics>{}</ListTopicsResult>\
         <ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata></ListTopicsResponse>",
        members, token
    )
}

#[allow(dead_code)]
pub fn create_topic_xml(arn: &str) -> String {
    format!(
        "<CreateTopicResponse><CreateTopicResult><TopicArn>{}</TopicArn></CreateTopicResult>\
         </CreateTopicResponse>",
        arn
    )
}

#[allow(dead_code)]
pub fn queue_url_xml(action: &str, url: &str) -> String {
    format!(
        "<{action}Response><{action}Result><QueueUrl>{url}</QueueUrl></{action}Result></{action}Response>",
        action = action,
        url = url
    )
}

#[allow(dead_code)]
pub fn queue_attributes_xml(attributes: &[(&str, &str)]) -> String {
    let entries: String = attributes
        .iter()
        .map(|(name, value)| {
            format!(
                "<Attribute><Name>{}</Name><Value>{}</Value></Attribute>",
                name,
                value.replace('"', "&quot;")
            )
        })
        .collect();
    format!(
        "<GetQueueAttributesResponse><GetQueueAttributesResult>{}</GetQueueAttributesResult>\
         </GetQueueAttributesResponse>",
        entries
    )
}

#[allow(dead_code)]
pub fn empty_xml(action: &str) -> String {
    format!(
        "<{action}Response><ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata></{action}Response>",
        action = action
    )
}

/// Query API error document
#[allow(dead_code)]
pub fn xml_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(
        format!(
            "<ErrorResponse><Error><Type>Sender</Type><Code>{}</Code><Message>{}</Message></Error>\
             <RequestId>req-1</RequestId></ErrorResponse>",
            code, message
        ),
        "text/xml",
    )
}

/// DynamoDB error document
#[allow(dead_code)]
pub fn json_error(code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "__type": format!("com.amazonaws.dynamodb.v20120810#{}", code),
        "message": message,
    }))
}

#[allow(dead_code)]
pub fn table_description(name: &str, status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "Table": {
            "TableName": name,
            "TableStatus": status,
            "TableArn": table_arn(name),
        }
    }))
}
