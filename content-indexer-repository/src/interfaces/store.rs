//! Persistence ports for site configuration and spotlight entries.
//!
//! The administrative surface that writes this data lives elsewhere; the
//! pipeline only needs the read accessors plus spotlight replacement.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use content_indexer_shared::{Site, SpotlightEntry};

/// Read access to site configuration.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Look up a site by name. `Ok(None)` if no such site exists.
    async fn find_site_by_name(&self, name: &str) -> Result<Option<Arc<Site>>, StoreError>;

    async fn list_sites(&self) -> Result<Vec<Arc<Site>>, StoreError>;
}

/// Access to spotlight entries.
#[async_trait]
pub trait SpotlightStore: Send + Sync {
    /// Every entry, curated or external, for (site, locale).
    async fn find_by_site_and_locale(
        &self,
        site: &str,
        locale: &str,
    ) -> Result<Vec<SpotlightEntry>, StoreError>;

    /// Externally managed entries carrying `external_id` for (site, locale).
    async fn find_managed_externally(
        &self,
        external_id: &str,
        site: &str,
        locale: &str,
    ) -> Result<Vec<SpotlightEntry>, StoreError>;

    /// Delete entries by id in one call. Returns how many were removed.
    async fn delete_all(&self, ids: &[Uuid]) -> Result<usize, StoreError>;

    /// Insert or replace an entry.
    async fn save(&self, entry: SpotlightEntry) -> Result<(), StoreError>;
}
