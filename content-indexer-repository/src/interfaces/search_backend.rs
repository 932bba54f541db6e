//! Search backend driver trait definition.
//!
//! This module defines the abstract interface for one live connection to a
//! search engine index or core, allowing different engine families (OpenSearch,
//! Solr, in-memory fakes) behind the same gateway.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::query::{BackendQuery, BackendResponse};
use content_indexer_shared::Attributes;

/// Driver for a single index (OpenSearch) or core (Solr).
///
/// # Thread Safety
///
/// Implementations are cached by the gateway and shared between workers, so
/// they must be `Send + Sync`.
///
/// # Error Handling
///
/// Connection-level failures must be reported as
/// [`SearchError::ConnectionError`] so the caller can tell a down backend
/// from a rejected request.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Index or core name, used in logs.
    fn name(&self) -> &str;

    /// Index a document, replacing any existing document with the same `id`.
    ///
    /// Changes may stay invisible to searches until [`SearchBackend::commit`].
    async fn index_document(&self, id: &str, document: &Attributes) -> Result<(), SearchError>;

    /// Delete the document with the given `id`. A missing document is not an error.
    async fn delete_by_id(&self, id: &str) -> Result<(), SearchError>;

    /// Delete every document whose `type` field equals `doc_type`.
    async fn delete_by_type(&self, doc_type: &str) -> Result<(), SearchError>;

    /// Make pending changes visible to searches.
    async fn commit(&self) -> Result<(), SearchError>;

    /// Execute a translated query.
    async fn search(&self, query: &BackendQuery) -> Result<BackendResponse, SearchError>;

    /// Check if the backend is reachable and serving.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the backend is healthy
    /// * `Ok(false)` - If the backend answered but reports itself unhealthy
    /// * `Err(SearchError)` - If the health check could not be executed
    async fn health_check(&self) -> Result<bool, SearchError>;
}
