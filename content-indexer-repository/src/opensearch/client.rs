//! OpenSearch driver.
//!
//! One [`OpenSearchBackend`] serves one index. The index is created with
//! [`IndexConfig::index_settings`] the first time the driver connects.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesRefreshParts},
    DeleteByQueryParts, DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::opensearch::index_config::IndexConfig;
use crate::opensearch::queries::{build_delete_by_type, build_search_body, parse_response};
use crate::query::{BackendQuery, BackendResponse};
use content_indexer_shared::Attributes;

/// OpenSearch driver for a single index.
///
/// # Example
///
/// ```ignore
/// use content_indexer_repository::opensearch::{IndexConfig, OpenSearchBackend};
///
/// let backend = OpenSearchBackend::connect(
///     "http://localhost:9200",
///     IndexConfig::new("intranet_en_us"),
/// )
/// .await?;
/// backend.commit().await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchBackend {
    /// Create a client for `url` without touching the cluster.
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        Ok(Self {
            client: OpenSearch::new(transport),
            index_config,
        })
    }

    /// Create a client and make sure its index exists.
    pub async fn connect(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let backend = Self::new(url, index_config)?;
        backend.ensure_index().await?;

        info!(
            url = %url,
            index = %backend.index_config.name,
            "Connected to OpenSearch"
        );
        Ok(backend)
    }

    fn index(&self) -> &str {
        &self.index_config.name
    }

    /// Create the index with the configured mappings unless it exists.
    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index()]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(self.index()))
            .body(self.index_config.index_settings())
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code().as_u16();
        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            // Another worker may have created it in the meantime.
            if status == 400 && body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            error!(status = status, body = %body, "Index creation failed");
            return Err(SearchError::from_status(
                status,
                &body,
                SearchError::IndexCreationError,
            ));
        }

        info!(index = %self.index(), "Created index");
        Ok(())
    }

    /// Turn a non-success response into an error.
    async fn check(response: Response, other: fn(String) -> SearchError) -> Result<Response, SearchError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "OpenSearch request failed");
        Err(SearchError::from_status(status.as_u16(), &body, other))
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    fn name(&self) -> &str {
        self.index()
    }

    #[instrument(skip(self, document), fields(index = %self.index()))]
    async fn index_document(&self, id: &str, document: &Attributes) -> Result<(), SearchError> {
        let response = self
            .client
            .index(IndexParts::IndexId(self.index(), id))
            .body(Value::Object(document.to_json_map()))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        Self::check(response, SearchError::IndexError).await?;
        debug!("Document indexed");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index()))]
    async fn delete_by_id(&self, id: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(self.index(), id))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        // 404 is acceptable - document may not exist
        if response.status_code().as_u16() == 404 {
            debug!("Document not found, nothing to delete");
            return Ok(());
        }
        Self::check(response, SearchError::DeleteError).await?;
        debug!("Document deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index()))]
    async fn delete_by_type(&self, doc_type: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[self.index()]))
            .body(build_delete_by_type(doc_type))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let response = Self::check(response, SearchError::DeleteError).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;
        debug!(deleted = body["deleted"].as_u64().unwrap_or_default(), "Documents deleted by type");
        Ok(())
    }

    async fn commit(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[self.index()]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        Self::check(response, SearchError::CommitError).await?;
        Ok(())
    }

    #[instrument(skip(self, query), fields(index = %self.index(), start = query.start, rows = query.rows))]
    async fn search(&self, query: &BackendQuery) -> Result<BackendResponse, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index()]))
            .body(build_search_body(query))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let response = Self::check(response, SearchError::QueryError).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        parse_response(&body)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::Index(&[self.index()]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        Ok(matches!(body["status"].as_str(), Some("green") | Some("yellow")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_indexer_shared::SearchParams;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use serde_json::json;

    fn backend(server: &MockServer) -> OpenSearchBackend {
        OpenSearchBackend::new(&server.base_url(), IndexConfig::new("site1_en_us")).unwrap()
    }

    #[test]
    fn test_invalid_url() {
        let result = OpenSearchBackend::new("not a url", IndexConfig::new("x"));
        assert!(matches!(result, Err(SearchError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_connect_creates_missing_index() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/site1_en_us");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/site1_en_us");
                then.status(200).json_body(json!({ "acknowledged": true }));
            })
            .await;

        OpenSearchBackend::connect(&server.base_url(), IndexConfig::new("site1_en_us"))
            .await
            .unwrap();

        exists.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_index_document() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.path("/site1_en_us/_doc/doc-1")
                    .json_body_partial(r#"{"title": "Hello"}"#);
                then.status(201).json_body(json!({ "result": "created" }));
            })
            .await;

        let doc = Attributes::new().with("id", "doc-1").with("title", "Hello");
        backend(&server).index_document("doc-1", &doc).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_ok() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/site1_en_us/_doc/gone");
                then.status(404).json_body(json!({ "result": "not_found" }));
            })
            .await;

        backend(&server).delete_by_id("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_status_is_connection_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/site1_en_us/_refresh");
                then.status(503).body("unavailable");
            })
            .await;

        let err = backend(&server).commit().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_search() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/site1_en_us/_search");
                then.status(200).json_body(json!({
                    "took": 2,
                    "hits": {
                        "total": { "value": 1, "relation": "eq" },
                        "hits": [{ "_id": "1", "_score": 1.0, "_source": { "id": "1", "title": "Rust" } }]
                    }
                }));
            })
            .await;

        let query = BackendQuery::translate(&SearchParams::new("rust"), 10);
        let response = backend(&server).search(&query).await.unwrap();

        assert_eq!(response.num_found, 1);
        assert_eq!(response.hits[0].fields.get_str("title"), Some("Rust"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_cluster/health/site1_en_us");
                then.status(200).json_body(json!({ "status": "yellow" }));
            })
            .await;

        assert!(backend(&server).health_check().await.unwrap());
    }
}
