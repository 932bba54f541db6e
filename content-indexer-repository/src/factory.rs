//! Builds the driver matching a site's configured engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::interfaces::{BackendFactory, SearchBackend};
use crate::opensearch::{IndexConfig, OpenSearchBackend};
use crate::solr::SolrBackend;
use content_indexer_shared::{EngineKind, Site, SiteLocale};

/// Connects OpenSearch indices or Solr cores depending on `site.engine.kind`.
#[derive(Debug, Default, Clone)]
pub struct EngineBackendFactory;

impl EngineBackendFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendFactory for EngineBackendFactory {
    async fn connect(
        &self,
        site: &Site,
        _locale: &SiteLocale,
        core: &str,
    ) -> Result<Arc<dyn SearchBackend>, SearchError> {
        match site.engine.kind {
            EngineKind::OpenSearch => {
                let backend =
                    OpenSearchBackend::connect(&site.engine.url, IndexConfig::new(core)).await?;
                Ok(Arc::new(backend))
            }
            EngineKind::Solr => Ok(Arc::new(SolrBackend::new(&site.engine.url, core)?)),
        }
    }
}
