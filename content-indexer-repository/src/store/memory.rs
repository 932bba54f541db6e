//! In-memory [`SiteStore`] and [`SpotlightStore`].
//!
//! Sites and spotlight entries live behind `std::sync::RwLock`s. The store
//! can be seeded from a JSON file of the shape
//! `{"sites": [...], "spotlights": [...]}`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::interfaces::{SiteStore, SpotlightStore};
use content_indexer_shared::{Site, SpotlightEntry};

/// Serialized form of the store contents.
#[derive(Debug, Default, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub spotlights: Vec<SpotlightEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    sites: RwLock<HashMap<String, Arc<Site>>>,
    spotlights: RwLock<HashMap<Uuid, SpotlightEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for site in snapshot.sites {
            store.add_site(site);
        }
        {
            let mut spotlights = store
                .spotlights
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for entry in snapshot.spotlights {
                spotlights.insert(entry.id, entry);
            }
        }
        store
    }

    /// Load sites and spotlights from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw)?;

        info!(
            path = %path.display(),
            sites = snapshot.sites.len(),
            spotlights = snapshot.spotlights.len(),
            "Loaded site configuration"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Add or replace a site.
    pub fn add_site(&self, site: Site) {
        self.sites
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(site.name.clone(), Arc::new(site));
    }

    /// Every spotlight entry, in no particular order.
    pub fn spotlights(&self) -> Vec<SpotlightEntry> {
        self.spotlights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SiteStore for InMemoryStore {
    async fn find_site_by_name(&self, name: &str) -> Result<Option<Arc<Site>>, StoreError> {
        Ok(self
            .sites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    async fn list_sites(&self) -> Result<Vec<Arc<Site>>, StoreError> {
        let mut sites: Vec<_> = self
            .sites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }
}

#[async_trait]
impl SpotlightStore for InMemoryStore {
    async fn find_by_site_and_locale(
        &self,
        site: &str,
        locale: &str,
    ) -> Result<Vec<SpotlightEntry>, StoreError> {
        Ok(self
            .spotlights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.site == site && e.locale == locale)
            .cloned()
            .collect())
    }

    async fn find_managed_externally(
        &self,
        external_id: &str,
        site: &str,
        locale: &str,
    ) -> Result<Vec<SpotlightEntry>, StoreError> {
        Ok(self
            .spotlights
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.site == site && e.locale == locale && e.is_managed_by(external_id))
            .cloned()
            .collect())
    }

    async fn delete_all(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut spotlights = self
            .spotlights
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(ids
            .iter()
            .filter(|id| spotlights.remove(*id).is_some())
            .count())
    }

    async fn save(&self, entry: SpotlightEntry) -> Result<(), StoreError> {
        self.spotlights
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.id, entry);
        Ok(())
    }
}
