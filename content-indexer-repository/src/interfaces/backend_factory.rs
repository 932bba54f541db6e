//! Backend construction seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use content_indexer_shared::{Site, SiteLocale};

/// Builds a live driver for one (site, locale, core).
///
/// The gateway calls this at most once per key and caches the result;
/// implementations don't need their own caching.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn connect(
        &self,
        site: &Site,
        locale: &SiteLocale,
        core: &str,
    ) -> Result<Arc<dyn SearchBackend>, SearchError>;
}
