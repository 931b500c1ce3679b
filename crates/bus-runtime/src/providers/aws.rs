//! AWS provider implementation using the HTTP APIs directly.
//!
//! Talks to SNS and SQS through their query APIs (XML responses) and to
//! DynamoDB through its JSON 1.0 API. Requests are signed with AWS Signature
//! Version 4 so responses can be mocked over plain HTTP in tests.
//!
//! ## Endpoints
//!
//! By default each service is addressed at
//! `https://{service}.{region}.amazonaws.com`. Setting
//! [`AwsProviderConfig::endpoint_url`] sends every service to a single
//! endpoint instead, which is how LocalStack and the test suite are used.
//!
//! ## Credentials
//!
//! Explicit keys from the configuration win; otherwise the standard
//! `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
//! environment variables are read when the provider is built. Without
//! credentials every request fails with an authentication error.
//!
//! ## Example
//!
//! ```no_run
//! use bus_runtime::providers::{AwsProvider, AwsProviderConfig};
//! use bus_runtime::ProviderSet;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = AwsProvider::new(AwsProviderConfig {
//!     endpoint_url: Some("http://localhost:4566".to_string()),
//!     ..AwsProviderConfig::default()
//! })?;
//! let providers = ProviderSet::from_provider(Arc::new(provider));
//! # Ok(())
//! # }
//! ```

use crate::descriptor::{QueueAttributes, RedrivePolicy};
use crate::error::ProviderError;
use crate::queue::{QueueStore, RemoteQueueAttributes};
use crate::table::{
    AttributeDefinition, KeySchemaElement, ProvisionedThroughput, TableDescription, TableSpec,
    TableStatus, TableStore,
};
use crate::topic::{TopicCatalog, TopicPage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const SNS_API_VERSION: &str = "2010-03-31";
const SQS_API_VERSION: &str = "2012-11-05";
const DYNAMODB_TARGET_PREFIX: &str = "DynamoDB_20120810";
const DYNAMODB_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Error codes that mean the addressed resource does not exist
const NOT_FOUND_CODES: [&str; 4] = [
    "NotFound",
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
    "ResourceNotFoundException",
];

const AUTHENTICATION_CODES: [&str; 5] = [
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
    "MissingAuthenticationToken",
    "ExpiredToken",
];

// ============================================================================
// Configuration
// ============================================================================

/// AWS provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsProviderConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,

    /// Single endpoint for every service, e.g. `http://localhost:4566`
    pub endpoint_url: Option<String>,

    pub request_timeout_seconds: u64,
}

impl Default for AwsProviderConfig {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
            request_timeout_seconds: 30,
        }
    }
}

/// Services this provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsService {
    Sns,
    Sqs,
    DynamoDb,
}

impl AwsService {
    pub fn signing_name(&self) -> &'static str {
        match self {
            Self::Sns => "sns",
            Self::Sqs => "sqs",
            Self::DynamoDb => "dynamodb",
        }
    }
}

impl fmt::Display for AwsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signing_name())
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
struct Credentials {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
}

/// AWS Signature Version 4 signer.
///
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct AwsV4Signer {
    credentials: Credentials,
}

impl AwsV4Signer {
    fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Headers to add to the request: `Authorization`, `x-amz-date`, `host`
    /// and the session token when one is in use.
    #[allow(clippy::too_many_arguments)]
    fn sign_request(
        &self,
        service: AwsService,
        region: &str,
        method: &str,
        host: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<HashMap<String, String>, ProviderError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let mut canonical_query_string = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>();
        canonical_query_string.sort();
        let canonical_query_string = canonical_query_string.join("&");

        // Canonical headers must be sorted by name
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp,
            region,
            service.signing_name()
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(service, region, &string_to_sign, &date_stamp)?;

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.credentials.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), authorization_header);
        headers.insert("x-amz-date".to_string(), amz_date);
        headers.insert("host".to_string(), host.to_string());
        if let Some(token) = &self.credentials.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        Ok(headers)
    }

    fn calculate_signature(
        &self,
        service: AwsService,
        region: &str,
        string_to_sign: &str,
        date_stamp: &str,
    ) -> Result<String, ProviderError> {
        let k_secret = format!("AWS4{}", self.credentials.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, service.signing_name().as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| ProviderError::AuthenticationFailed {
            message: format!("Invalid signing key: {}", e),
        })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ============================================================================
// Provider
// ============================================================================

/// Provider backed by SNS, SQS and DynamoDB.
///
/// Thread-safe; share it across tasks with `Arc`.
pub struct AwsProvider {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    config: AwsProviderConfig,
}

impl AwsProvider {
    pub fn new(config: AwsProviderConfig) -> Result<Self, ProviderError> {
        let access_key = config
            .access_key_id
            .clone()
            .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok());
        let secret_key = config
            .secret_access_key
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok());
        let session_token = config
            .session_token
            .clone()
            .or_else(|| std::env::var("AWS_SESSION_TOKEN").ok());

        let signer = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(AwsV4Signer::new(Credentials {
                access_key,
                secret_key,
                session_token,
            })),
            _ => None,
        };

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ProviderError::ConnectionFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            config,
        })
    }

    pub fn config(&self) -> &AwsProviderConfig {
        &self.config
    }

    /// Base URL a service is addressed at in a region
    pub fn endpoint(&self, service: AwsService, region: &str) -> String {
        match &self.config.endpoint_url {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}.amazonaws.com", service.signing_name(), region),
        }
    }

    /// Call a query API action; returns the XML response body
    async fn query_request(
        &self,
        service: AwsService,
        region: &str,
        params: BTreeMap<String, String>,
    ) -> Result<String, ProviderError> {
        self.send(service, region, &params, HashMap::new(), String::new())
            .await
    }

    /// Call a DynamoDB action; returns the parsed JSON response
    async fn json_request<T>(
        &self,
        region: &str,
        action: &str,
        payload: &T,
    ) -> Result<serde_json::Value, ProviderError>
    where
        T: Serialize + Sync,
    {
        let body = serde_json::to_string(payload).map_err(|e| ProviderError::MalformedResponse {
            message: format!("Failed to encode {} request: {}", action, e),
        })?;

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), DYNAMODB_CONTENT_TYPE.to_string());
        headers.insert(
            "x-amz-target".to_string(),
            format!("{}.{}", DYNAMODB_TARGET_PREFIX, action),
        );

        let response = self
            .send(AwsService::DynamoDb, region, &BTreeMap::new(), headers, body)
            .await?;

        if response.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&response).map_err(|e| ProviderError::MalformedResponse {
            message: format!("Invalid {} response: {}", action, e),
        })
    }

    async fn send(
        &self,
        service: AwsService,
        region: &str,
        query_params: &BTreeMap<String, String>,
        extra_headers: HashMap<String, String>,
        body: String,
    ) -> Result<String, ProviderError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| ProviderError::AuthenticationFailed {
                message: "No credentials configured".to_string(),
            })?;

        let endpoint = self.endpoint(service, region);
        let parsed = url::Url::parse(&endpoint).map_err(|e| ProviderError::ConnectionFailed {
            message: format!("Invalid endpoint '{}': {}", endpoint, e),
        })?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProviderError::ConnectionFailed {
                    message: format!("Endpoint '{}' has no host", endpoint),
                })
            }
        };

        let path = "/";
        let auth_headers = signer.sign_request(
            service,
            region,
            "POST",
            &host,
            path,
            query_params,
            &body,
            &Utc::now(),
        )?;

        let mut url = format!("{}{}", endpoint, path);
        if !query_params.is_empty() {
            let query_string = query_params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{}?{}", url, query_string);
        }

        let mut request = self.http_client.post(&url);
        for (key, value) in auth_headers.into_iter().chain(extra_headers) {
            request = request.header(key, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let action = query_params.get("Action").map(String::as_str).unwrap_or("");
        debug!(service = %service, region, action, "Sending provider request");

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timeout: {}", e)
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                format!("HTTP request failed: {}", e)
            };
            ProviderError::ConnectionFailed { message }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ProviderError::ConnectionFailed {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            let (code, message) = match service {
                AwsService::DynamoDb => parse_json_error(&response_body),
                AwsService::Sns | AwsService::Sqs => parse_xml_error(&response_body),
            };
            return Err(map_error(service, status.as_u16(), code, message));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for AwsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsProvider")
            .field("endpoint_url", &self.config.endpoint_url)
            .field("has_credentials", &self.signer.is_some())
            .finish()
    }
}

// ============================================================================
// Error mapping
// ============================================================================

fn map_error(service: AwsService, status_code: u16, code: String, message: String) -> ProviderError {
    if NOT_FOUND_CODES.contains(&code.as_str()) {
        return ProviderError::NotFound { resource: message };
    }
    if AUTHENTICATION_CODES.contains(&code.as_str()) || status_code == 401 {
        return ProviderError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        };
    }
    ProviderError::Service {
        service: service.to_string(),
        code,
        message,
    }
}

/// Error code and message of a query API error document
fn parse_xml_error(xml: &str) -> (String, String) {
    let code = xml_text_values(xml, b"Code")
        .ok()
        .and_then(|values| values.into_iter().next())
        .unwrap_or_else(|| "Unknown".to_string());
    let message = xml_text_values(xml, b"Message")
        .ok()
        .and_then(|values| values.into_iter().next())
        .unwrap_or_else(|| "Unknown error".to_string());
    (code, message)
}

/// Error code and message of a JSON API error document.
///
/// `__type` carries a namespace before `#`; only the suffix is the code.
fn parse_json_error(body: &str) -> (String, String) {
    let json: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    let code = json
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let message = json
        .get("message")
        .or_else(|| json.get("Message"))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    (code, message)
}

// ============================================================================
// XML parsing
// ============================================================================

/// Text content of every element named `tag`, in document order
fn xml_text_values(xml: &str, tag: &[u8]) -> Result<Vec<String>, ProviderError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut values = Vec::new();
    let mut in_tag = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == tag => in_tag = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == tag => in_tag = false,
            Ok(Event::Text(e)) if in_tag => {
                let text = e.unescape().map_err(|e| ProviderError::MalformedResponse {
                    message: format!("Failed to parse XML: {}", e),
                })?;
                values.push(text.into_owned());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::MalformedResponse {
                    message: format!("XML parsing error: {}", e),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(values)
}

fn xml_required_value(xml: &str, tag: &str) -> Result<String, ProviderError> {
    xml_text_values(xml, tag.as_bytes())?
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse {
            message: format!("{} not found in response", tag),
        })
}

/// `<Attribute><Name>..</Name><Value>..</Value></Attribute>` pairs
fn xml_attribute_map(xml: &str) -> Result<HashMap<String, String>, ProviderError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut attributes = HashMap::new();
    let mut current_name: Option<String> = None;
    let mut current_value: Option<String> = None;
    let mut field: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Attribute" => {
                    current_name = None;
                    current_value = None;
                }
                b"Name" => field = Some("name"),
                b"Value" => field = Some("value"),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ProviderError::MalformedResponse {
                        message: format!("Failed to parse XML: {}", e),
                    })?
                    .into_owned();
                match field {
                    Some("name") => current_name = Some(text),
                    Some("value") => current_value = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"Name" | b"Value" => field = None,
                b"Attribute" => {
                    if let Some(name) = current_name.take() {
                        attributes.insert(name, current_value.take().unwrap_or_default());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProviderError::MalformedResponse {
                    message: format!("XML parsing error: {}", e),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(attributes)
}

// ============================================================================
// Query API parameters
// ============================================================================

fn action_params(action: &str, version: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("Action".to_string(), action.to_string());
    params.insert("Version".to_string(), version.to_string());
    params
}

/// Add `Attribute.N.Name` / `Attribute.N.Value` entries for queue attributes
fn add_queue_attribute_params(
    params: &mut BTreeMap<String, String>,
    attributes: &QueueAttributes,
    redrive_policy: Option<&RedrivePolicy>,
) {
    let mut entries = vec![
        (
            "MessageRetentionPeriod",
            attributes.message_retention_seconds.to_string(),
        ),
        (
            "VisibilityTimeout",
            attributes.visibility_timeout_seconds.to_string(),
        ),
        ("DelaySeconds", attributes.delivery_delay_seconds.to_string()),
    ];
    if let Some(policy) = redrive_policy {
        entries.push(("RedrivePolicy", policy.to_attribute()));
    }

    for (index, (name, value)) in entries.into_iter().enumerate() {
        let n = index + 1;
        params.insert(format!("Attribute.{}.Name", n), name.to_string());
        params.insert(format!("Attribute.{}.Value", n), value);
    }
}

fn parse_u32_attribute(
    attributes: &HashMap<String, String>,
    name: &str,
    default: u32,
) -> Result<u32, ProviderError> {
    match attributes.get(name) {
        Some(value) => value.parse().map_err(|_| ProviderError::MalformedResponse {
            message: format!("Queue attribute {} is not a number: '{}'", name, value),
        }),
        None => Ok(default),
    }
}

fn queue_attributes_from_map(
    attributes: &HashMap<String, String>,
) -> Result<RemoteQueueAttributes, ProviderError> {
    let defaults = QueueAttributes::default();
    let arn = attributes
        .get("QueueArn")
        .cloned()
        .ok_or_else(|| ProviderError::MalformedResponse {
            message: "QueueArn not found in response".to_string(),
        })?;

    let redrive_policy = match attributes.get("RedrivePolicy") {
        Some(value) if !value.is_empty() => Some(RedrivePolicy::from_attribute(value)?),
        _ => None,
    };

    Ok(RemoteQueueAttributes {
        arn,
        attributes: QueueAttributes {
            message_retention_seconds: parse_u32_attribute(
                attributes,
                "MessageRetentionPeriod",
                defaults.message_retention_seconds,
            )?,
            visibility_timeout_seconds: parse_u32_attribute(
                attributes,
                "VisibilityTimeout",
                defaults.visibility_timeout_seconds,
            )?,
            delivery_delay_seconds: parse_u32_attribute(
                attributes,
                "DelaySeconds",
                defaults.delivery_delay_seconds,
            )?,
        },
        redrive_policy,
    })
}

// ============================================================================
// DynamoDB payloads
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateTableRequest<'a> {
    table_name: &'a str,
    attribute_definitions: &'a [AttributeDefinition],
    key_schema: &'a [KeySchemaElement],
    provisioned_throughput: ProvisionedThroughput,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTableRequest<'a> {
    table_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTableResponse {
    table: TableDescriptionPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableDescriptionPayload {
    table_name: String,
    table_status: String,
    table_arn: Option<String>,
}

// ============================================================================
// Trait implementations
// ============================================================================

#[async_trait]
impl TopicCatalog for AwsProvider {
    async fn list_topics(
        &self,
        region: &str,
        next_token: Option<String>,
    ) -> Result<TopicPage, ProviderError> {
        let mut params = action_params("ListTopics", SNS_API_VERSION);
        if let Some(token) = next_token {
            params.insert("NextToken".to_string(), token);
        }

        let xml = self.query_request(AwsService::Sns, region, params).await?;
        Ok(TopicPage {
            topic_arns: xml_text_values(&xml, b"TopicArn")?,
            next_token: xml_text_values(&xml, b"NextToken")?
                .into_iter()
                .next()
                .filter(|token| !token.is_empty()),
        })
    }

    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError> {
        let mut params = action_params("CreateTopic", SNS_API_VERSION);
        params.insert("Name".to_string(), name.to_string());

        let xml = self.query_request(AwsService::Sns, region, params).await?;
        xml_required_value(&xml, "TopicArn")
    }
}

#[async_trait]
impl QueueStore for AwsProvider {
    async fn get_queue_url(
        &self,
        region: &str,
        queue_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        let mut params = action_params("GetQueueUrl", SQS_API_VERSION);
        params.insert("QueueName".to_string(), queue_name.to_string());

        match self.query_request(AwsService::Sqs, region, params).await {
            Ok(xml) => xml_required_value(&xml, "QueueUrl").map(Some),
            Err(ProviderError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_queue(
        &self,
        region: &str,
        queue_name: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<String, ProviderError> {
        let mut params = action_params("CreateQueue", SQS_API_VERSION);
        params.insert("QueueName".to_string(), queue_name.to_string());
        add_queue_attribute_params(&mut params, attributes, redrive_policy);

        let xml = self.query_request(AwsService::Sqs, region, params).await?;
        xml_required_value(&xml, "QueueUrl")
    }

    async fn get_queue_attributes(
        &self,
        region: &str,
        queue_url: &str,
    ) -> Result<RemoteQueueAttributes, ProviderError> {
        let mut params = action_params("GetQueueAttributes", SQS_API_VERSION);
        params.insert("QueueUrl".to_string(), queue_url.to_string());
        params.insert("AttributeName.1".to_string(), "All".to_string());

        let xml = self.query_request(AwsService::Sqs, region, params).await?;
        queue_attributes_from_map(&xml_attribute_map(&xml)?)
    }

    async fn set_queue_attributes(
        &self,
        region: &str,
        queue_url: &str,
        attributes: &QueueAttributes,
        redrive_policy: Option<&RedrivePolicy>,
    ) -> Result<(), ProviderError> {
        let mut params = action_params("SetQueueAttributes", SQS_API_VERSION);
        params.insert("QueueUrl".to_string(), queue_url.to_string());
        add_queue_attribute_params(&mut params, attributes, redrive_policy);

        self.query_request(AwsService::Sqs, region, params).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for AwsProvider {
    async fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> Result<Option<TableDescription>, ProviderError> {
        let request = DescribeTableRequest { table_name };
        let json = match self.json_request(region, "DescribeTable", &request).await {
            Ok(json) => json,
            Err(ProviderError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let response: DescribeTableResponse =
            serde_json::from_value(json).map_err(|e| ProviderError::MalformedResponse {
                message: format!("Invalid DescribeTable response: {}", e),
            })?;

        Ok(Some(TableDescription {
            name: response.table.table_name,
            status: TableStatus::parse(&response.table.table_status),
            arn: response.table.table_arn,
        }))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), ProviderError> {
        let request = CreateTableRequest {
            table_name: &spec.name,
            attribute_definitions: &spec.attribute_definitions,
            key_schema: &spec.key_schema,
            provisioned_throughput: spec.provisioned_throughput,
        };
        self.json_request(&spec.region, "CreateTable", &request)
            .await?;
        Ok(())
    }
}
