//! Thesaurus term detection hand-off.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PipelineError;
use content_indexer_shared::Attributes;

/// External thesaurus service detecting controlled-vocabulary terms.
#[async_trait]
pub trait ThesaurusService: Send + Sync {
    /// Detect terms in `attributes`; returns the attributes to merge in by key.
    async fn detect_terms(&self, attributes: &Attributes) -> Result<Attributes, PipelineError>;
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    attributes: &'a Attributes,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    attributes: Attributes,
}

/// Thesaurus service reached over HTTP at `POST {base_url}/detect`.
pub struct HttpThesaurusService {
    client: Client,
    base_url: String,
}

impl HttpThesaurusService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent("content-indexer/0.1")
            .build()
            .map_err(|e| PipelineError::enrichment(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ThesaurusService for HttpThesaurusService {
    async fn detect_terms(&self, attributes: &Attributes) -> Result<Attributes, PipelineError> {
        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&DetectRequest { attributes })
            .send()
            .await
            .map_err(|e| PipelineError::enrichment(format!("Thesaurus request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::enrichment(format!(
                "Thesaurus returned status {}: {}",
                status, body
            )));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::enrichment(format!("Invalid thesaurus response: {}", e)))?;

        debug!(added = body.attributes.len(), "Thesaurus detection complete");
        Ok(body.attributes)
    }
}
