//! Error types for configuration, provider calls and provisioning.

use std::time::Duration;
use thiserror::Error;

/// Provider error codes that indicate another caller is creating the same
/// resource at the same time.
pub const CONCURRENT_CREATION_CODES: [&str; 2] = ["ResourceInUseException", "ThrottlingException"];

/// Umbrella error for operations on an assembled bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),
}

/// Configuration errors, fatal at assembly time
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Cannot have a blank entry for config.regions")]
    EmptyRegionList,

    #[error("Region {region} was added multiple times")]
    DuplicateRegion { region: String },

    #[error("Active region '{region}' is not one of the configured regions")]
    UnknownActiveRegion { region: String },

    #[error("No resource provider configured for the bus")]
    MissingProvider,

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },
}

/// How the provisioning layer treats a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorClass {
    /// Throttling or eventual-consistency not-found; recovered by polling
    Transient,
    /// Another caller is creating the same resource
    Conflict,
    /// Everything else; surfaced to the caller
    Fatal,
}

/// Errors reported by a remote resource provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Provider error ({service}): {code} - {message}")]
    Service {
        service: String,
        code: String,
        message: String,
    },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Malformed provider response: {message}")]
    MalformedResponse { message: String },
}

impl ProviderError {
    /// Provider error code, if the provider reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code.as_str()),
            Self::NotFound { .. } => Some("ResourceNotFoundException"),
            _ => None,
        }
    }

    /// Check if this failure means another caller won a creation race
    pub fn is_concurrent_creation(&self) -> bool {
        self.code()
            .map(|code| CONCURRENT_CREATION_CODES.contains(&code))
            .unwrap_or(false)
    }

    /// Classify the error for the provisioning state machines
    pub fn class(&self) -> ProviderErrorClass {
        match self {
            Self::NotFound { .. } => ProviderErrorClass::Transient,
            Self::Service { code, .. } if code == "ThrottlingException" => {
                ProviderErrorClass::Transient
            }
            Self::Service { code, .. } if code == "ResourceInUseException" => {
                ProviderErrorClass::Conflict
            }
            Self::Service { code, .. } if code == "QueueAlreadyExists" => {
                ProviderErrorClass::Conflict
            }
            Self::ConnectionFailed { .. } => ProviderErrorClass::Transient,
            _ => ProviderErrorClass::Fatal,
        }
    }
}

/// Errors that abort a single provisioning call
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{resource} did not become ready within {waited:?}")]
    Timeout { resource: String, waited: Duration },

    #[error("Provisioning of {resource} was cancelled")]
    Cancelled { resource: String },

    #[error("Table '{table}' can only be provisioned from a table spec")]
    MissingTableSpec { table: String },
}

/// Errors during message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No serializer registered for message type '{message_type}'")]
    UnknownMessageType { message_type: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
