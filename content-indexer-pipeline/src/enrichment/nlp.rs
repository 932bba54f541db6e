//! NLP entity extraction hand-off.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PipelineError;
use content_indexer_shared::Attributes;

/// External entity-extraction service.
#[async_trait]
pub trait NlpService: Send + Sync {
    /// Run extraction on `attributes` with the NLP instance `instance` and
    /// return the attributes to add.
    async fn extract(&self, instance: &str, attributes: &Attributes) -> Result<Attributes, PipelineError>;
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    attributes: &'a Attributes,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    attributes: Attributes,
}

/// NLP service reached over HTTP.
///
/// `POST {base_url}/instances/{instance}/extract` with
/// `{"attributes": {...}}`, answered by `{"attributes": {...}}`.
pub struct HttpNlpService {
    client: Client,
    base_url: String,
}

impl HttpNlpService {
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
impl NlpService for HttpNlpService {
    async fn extract(&self, instance: &str, attributes: &Attributes) -> Result<Attributes, PipelineError> {
        let url = format!("{}/instances/{}/extract", self.base_url, instance);
        let response = self
            .client
            .post(&url)
            .json(&ExtractRequest { attributes })
            .send()
            .await
            .map_err(|e| PipelineError::enrichment(format!("NLP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::enrichment(format!(
                "NLP returned status {}: {}",
                status, body
            )));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::enrichment(format!("Invalid NLP response: {}", e)))?;

        debug!(instance = %instance, added = body.attributes.len(), "NLP extraction complete");
        Ok(body.attributes)
    }
}
