//! Topic lookup and provisioning.

use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::{ProviderError, ProvisioningError};
use crate::provision::{Provisioned, ProvisioningOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, Span};

#[cfg(test)]
use mockall::automock;

/// One page of a topic listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicPage {
    pub topic_arns: Vec<String>,
    pub next_token: Option<String>,
}

/// Topic operations consumed from the remote provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopicCatalog: Send + Sync {
    /// List one page of topics in a region
    async fn list_topics(
        &self,
        region: &str,
        next_token: Option<String>,
    ) -> Result<TopicPage, ProviderError>;

    /// Create a topic, returning its ARN. Creating an existing topic returns
    /// the existing ARN.
    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError>;
}

/// Answers whether a topic exists, by ARN or by name.
///
/// Every call walks the full remote listing; nothing is cached and provider
/// failures are returned as-is.
pub struct TopicLocator {
    catalog: Arc<dyn TopicCatalog>,
    region: String,
    span: Span,
}

impl TopicLocator {
    /// Locator over the topics of one region
    pub fn new(catalog: Arc<dyn TopicCatalog>, region: impl Into<String>) -> Self {
        Self {
            catalog,
            region: region.into(),
            span: Span::current(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check whether a topic with exactly this ARN exists
    ///
    /// ```rust
    /// use bus_runtime::providers::InMemoryProvider;
    /// use bus_runtime::TopicLocator;
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let provider = Arc::new(InMemoryProvider::default());
    /// let arn = provider.add_topic("eu-west-1", "OrderPlaced").await;
    /// let locator = TopicLocator::new(provider.clone(), "eu-west-1");
    ///
    /// assert!(locator.exists(&arn).await.unwrap());
    /// assert!(!locator
    ///     .exists(&provider.topic_arn("eu-west-1", "OrderShipped"))
    ///     .await
    ///     .unwrap());
    /// # });
    /// ```
    pub async fn exists(&self, topic_arn: &str) -> Result<bool, ProviderError> {
        let found = self.find(|arn| arn == topic_arn).await?.is_some();
        debug!(parent: &self.span, topic_arn, found, "Topic lookup by ARN");
        Ok(found)
    }

    /// Find the ARN of a topic by name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let arn = self.find(|arn| topic_name_from_arn(arn) == name).await?;
        debug!(parent: &self.span, topic = name, found = arn.is_some(), "Topic lookup by name");
        Ok(arn)
    }

    async fn find<F>(&self, matches: F) -> Result<Option<String>, ProviderError>
    where
        F: Fn(&str) -> bool,
    {
        find_topic(self.catalog.as_ref(), &self.region, matches).await
    }
}

async fn find_topic<F>(
    catalog: &dyn TopicCatalog,
    region: &str,
    matches: F,
) -> Result<Option<String>, ProviderError>
where
    F: Fn(&str) -> bool,
{
    let mut next_token = None;
    loop {
        let page = catalog.list_topics(region, next_token).await?;
        if let Some(arn) = page.topic_arns.into_iter().find(|arn| matches(arn)) {
            return Ok(Some(arn));
        }
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => return Ok(None),
        }
    }
}

/// Last segment of a topic ARN, `arn:aws:sns:{region}:{account}:{name}`
pub fn topic_name_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

/// Ensure a topic exists and resolve its ARN.
///
/// A descriptor that already carries an ARN is checked by ARN; otherwise the
/// topic is looked up by name and created when absent.
pub async fn ensure_topic(
    catalog: &dyn TopicCatalog,
    mut descriptor: ResourceDescriptor,
    span: &Span,
) -> Result<Provisioned, ProvisioningError> {
    debug_assert_eq!(descriptor.kind(), ResourceKind::Topic);

    let region = descriptor.region().to_string();
    let name = descriptor.name().to_string();

    let existing = match descriptor.arn() {
        Some(arn) => {
            let arn = arn.to_string();
            find_topic(catalog, &region, |candidate| candidate == arn).await?
        }
        None => find_topic(catalog, &region, |candidate| topic_name_from_arn(candidate) == name)
            .await?,
    };

    if let Some(arn) = existing {
        descriptor.set_arn(arn);
        return Ok(Provisioned {
            outcome: ProvisioningOutcome::Found,
            descriptor,
        });
    }

    let arn = catalog.create_topic(&region, &name).await?;
    info!(parent: span, topic = %name, region = %region, topic_arn = %arn, "Created topic");
    descriptor.set_arn(arn);

    Ok(Provisioned {
        outcome: ProvisioningOutcome::Created,
        descriptor,
    })
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
