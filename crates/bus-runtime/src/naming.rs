//! Naming strategies mapping logical names to the physical names on the wire.

/// Maps logical message types and queue names to physical resource names.
///
/// Implementations must be pure and total.
pub trait NamingStrategy: Send + Sync {
    /// Physical topic name for a message type
    fn topic_name(&self, message_type: &str) -> String;

    /// Physical queue name for a logical queue consuming a message type
    fn queue_name(&self, queue_name: &str, message_type: &str) -> String;
}

/// Identity mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {
    fn topic_name(&self, message_type: &str) -> String {
        message_type.to_string()
    }

    fn queue_name(&self, queue_name: &str, _message_type: &str) -> String {
        queue_name.to_string()
    }
}

/// Prefixes every physical name with an environment name, e.g. `uat-orderplaced`
#[derive(Debug, Clone)]
pub struct PrefixedNamingStrategy {
    prefix: String,
}

impl PrefixedNamingStrategy {
    /// Strategy joining `prefix` and the logical name with a hyphen
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment prefix applied to every name
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl NamingStrategy for PrefixedNamingStrategy {
    fn topic_name(&self, message_type: &str) -> String {
        format!("{}-{}", self.prefix, message_type)
    }

    fn queue_name(&self, queue_name: &str, _message_type: &str) -> String {
        format!("{}-{}", self.prefix, queue_name)
    }
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
