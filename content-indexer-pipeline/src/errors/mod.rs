//! Error types for the content indexer pipeline.

use content_indexer_repository::{SearchError, StoreError};
use thiserror::Error;

/// Errors that can occur in the content indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The job item names a site that is not configured.
    #[error("Site not found: {0}")]
    SiteNotFound(String),

    /// The site has no backend instance for the item's locale.
    #[error("No backend instance for site {site}, locale {locale}")]
    InstanceUnavailable { site: String, locale: String },

    /// The job item lacks an attribute its action requires.
    #[error("Invalid job item: {0}")]
    InvalidItem(String),

    /// An NLP or thesaurus call failed.
    #[error("Enrichment error: {0}")]
    EnrichmentError(String),

    /// Error from the search backend.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),

    /// Error from the site or spotlight store.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// Error from the queue consumer.
    #[error("Consumer error: {0}")]
    ConsumerError(String),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl PipelineError {
    /// Create a site-not-found error.
    pub fn site_not_found(name: impl Into<String>) -> Self {
        Self::SiteNotFound(name.into())
    }

    /// Create an instance-unavailable error.
    pub fn instance_unavailable(site: impl Into<String>, locale: impl Into<String>) -> Self {
        Self::InstanceUnavailable {
            site: site.into(),
            locale: locale.into(),
        }
    }

    /// Create an invalid-item error.
    pub fn invalid_item(msg: impl Into<String>) -> Self {
        Self::InvalidItem(msg.into())
    }

    /// Create an enrichment error.
    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::EnrichmentError(msg.into())
    }

    /// Create a consumer error.
    pub fn consumer(msg: impl Into<String>) -> Self {
        Self::ConsumerError(msg.into())
    }

    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether this failure means the search backend is down.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::SearchError(e) if e.is_unavailable())
    }
}

impl From<rdkafka::error::KafkaError> for PipelineError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_classification() {
        assert!(PipelineError::from(SearchError::connection("refused")).is_backend_unavailable());
        assert!(!PipelineError::from(SearchError::index("bad mapping")).is_backend_unavailable());
        assert!(!PipelineError::site_not_found("site1").is_backend_unavailable());
    }
}
