//! HTTP driver for a single Solr core.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::query::{BackendQuery, BackendResponse};
use crate::solr::queries::{parse_response, select_params, type_query};
use content_indexer_shared::Attributes;

/// Solr makes indexed documents visible within this window even without an
/// explicit commit.
const COMMIT_WITHIN_MS: u32 = 10_000;

pub struct SolrBackend {
    client: Client,
    core_url: String,
    core: String,
}

impl SolrBackend {
    /// Create a driver for `core` under the Solr base URL
    /// (e.g. `http://localhost:8983/solr`).
    pub fn new(base_url: &str, core: &str) -> Result<Self, SearchError> {
        let parsed = Url::parse(base_url).map_err(|e| SearchError::connection(e.to_string()))?;
        let client = Client::builder()
            .user_agent("content-indexer/0.1")
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let core_url = format!("{}/{}", parsed.as_str().trim_end_matches('/'), core);
        info!(url = %core_url, "Created Solr client");

        Ok(Self {
            client,
            core_url,
            core: core.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.core_url, path)
    }

    async fn update(&self, body: Value, commit: bool, other: fn(String) -> SearchError) -> Result<(), SearchError> {
        let mut request = self.client.post(self.endpoint("update")).json(&body);
        request = if commit {
            request.query(&[("commit", "true")])
        } else {
            request.query(&[("commitWithin", COMMIT_WITHIN_MS)])
        };

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;
        Self::check(response, other).await?;
        Ok(())
    }

    async fn check(response: Response, other: fn(String) -> SearchError) -> Result<Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Solr request failed");
        Err(SearchError::from_status(status.as_u16(), &body, other))
    }
}

#[async_trait]
impl SearchBackend for SolrBackend {
    fn name(&self) -> &str {
        &self.core
    }

    #[instrument(skip(self, document), fields(core = %self.core))]
    async fn index_document(&self, id: &str, document: &Attributes) -> Result<(), SearchError> {
        self.update(json!([document.to_json_map()]), false, SearchError::IndexError)
            .await?;
        debug!("Document indexed");
        Ok(())
    }

    #[instrument(skip(self), fields(core = %self.core))]
    async fn delete_by_id(&self, id: &str) -> Result<(), SearchError> {
        self.update(json!({ "delete": { "id": id } }), false, SearchError::DeleteError)
            .await?;
        debug!("Document deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(core = %self.core))]
    async fn delete_by_type(&self, doc_type: &str) -> Result<(), SearchError> {
        self.update(
            json!({ "delete": { "query": type_query(doc_type) } }),
            false,
            SearchError::DeleteError,
        )
        .await?;
        debug!("Documents deleted by type");
        Ok(())
    }

    async fn commit(&self) -> Result<(), SearchError> {
        self.update(json!({ "commit": {} }), true, SearchError::CommitError)
            .await
    }

    #[instrument(skip(self, query), fields(core = %self.core, start = query.start, rows = query.rows))]
    async fn search(&self, query: &BackendQuery) -> Result<BackendResponse, SearchError> {
        let response = self
            .client
            .get(self.endpoint("select"))
            .query(&select_params(query))
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
            .get(self.endpoint("admin/ping"))
            .query(&[("wt", "json")])
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        Ok(body["status"].as_str() == Some("OK"))
    }
}
