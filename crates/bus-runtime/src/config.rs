//! Messaging configuration and region validation.

use crate::error::ConfigurationError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of publish re-attempts after a failure
pub const DEFAULT_PUBLISHER_RETRY_COUNT: u32 = 3;

/// Default backoff between publish re-attempts
pub const DEFAULT_PUBLISHER_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Function selecting the currently active region
pub type ActiveRegionSelector = Arc<dyn Fn() -> String + Send + Sync>;

/// Root configuration of a messaging bus.
///
/// Built with the `with_*` methods, validated once by the assembler and then
/// shared behind an `Arc`; there are no mutators on a shared reference.
#[derive(Clone)]
pub struct MessagingConfig {
    regions: Vec<String>,
    publish_failure_reattempts: u32,
    publish_failure_backoff: Duration,
    active_region: Option<ActiveRegionSelector>,
}

impl MessagingConfig {
    /// Create a configuration for the given regions with default retry settings
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            publish_failure_reattempts: DEFAULT_PUBLISHER_RETRY_COUNT,
            publish_failure_backoff: DEFAULT_PUBLISHER_RETRY_INTERVAL,
            active_region: None,
        }
    }

    /// Set the number of publish re-attempts
    pub fn with_publish_failure_reattempts(mut self, reattempts: u32) -> Self {
        self.publish_failure_reattempts = reattempts;
        self
    }

    /// Set the backoff between publish re-attempts
    pub fn with_publish_failure_backoff(mut self, backoff: Duration) -> Self {
        self.publish_failure_backoff = backoff;
        self
    }

    /// Set the function that selects the active region
    pub fn with_active_region<F>(mut self, selector: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.active_region = Some(Arc::new(selector));
        self
    }

    /// Configured regions in order
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Number of publish re-attempts after a failure
    pub fn publish_failure_reattempts(&self) -> u32 {
        self.publish_failure_reattempts
    }

    /// Backoff between publish re-attempts
    pub fn publish_failure_backoff(&self) -> Duration {
        self.publish_failure_backoff
    }

    /// Region currently selected as active.
    ///
    /// Falls back to the first configured region when no selector was given.
    pub fn active_region(&self) -> String {
        match &self.active_region {
            Some(selector) => selector(),
            None => self.regions.first().cloned().unwrap_or_default(),
        }
    }

    /// Check the region invariants
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_regions(&self.regions)
    }
}

impl fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingConfig")
            .field("regions", &self.regions)
            .field("publish_failure_reattempts", &self.publish_failure_reattempts)
            .field("publish_failure_backoff", &self.publish_failure_backoff)
            .field("active_region", &self.active_region.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Validate a region list.
///
/// Fails with [`ConfigurationError::EmptyRegionList`] when the list is empty or
/// starts with a blank entry, and with [`ConfigurationError::DuplicateRegion`]
/// naming the first entry that repeats an earlier one.
pub fn validate_regions<S: AsRef<str>>(regions: &[S]) -> Result<(), ConfigurationError> {
    match regions.first() {
        None => return Err(ConfigurationError::EmptyRegionList),
        Some(first) if first.as_ref().trim().is_empty() => {
            return Err(ConfigurationError::EmptyRegionList)
        }
        Some(_) => {}
    }

    let mut seen = HashSet::with_capacity(regions.len());
    for region in regions {
        if !seen.insert(region.as_ref()) {
            return Err(ConfigurationError::DuplicateRegion {
                region: region.as_ref().to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
