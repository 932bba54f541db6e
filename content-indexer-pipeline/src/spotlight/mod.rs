//! Spotlight term index and external spotlight sync.
//!
//! Spotlights promote curated content for given search terms. Entries created
//! by curators are only read here; entries sent by a content source
//! (`managed_externally`) are replaced wholesale every time the source sends
//! an update.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use content_indexer_repository::SpotlightStore;
use content_indexer_shared::{JobItem, Site, SpotlightDocument, SpotlightEntry, SPOTLIGHT_TYPE};

/// `(term, entry)` pairs for one (site, locale).
pub type SpotlightTerms = Arc<Vec<(String, SpotlightEntry)>>;

type CacheKey = (String, String);

#[derive(Default)]
struct CachedTerms {
    terms: HashMap<CacheKey, SpotlightTerms>,
    /// Bumped on every invalidation. A load only lands if the generation it
    /// started from is still current.
    generations: HashMap<CacheKey, u64>,
}

pub struct SpotlightCache {
    store: Arc<dyn SpotlightStore>,
    cached: RwLock<CachedTerms>,
}

fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

impl SpotlightCache {
    pub fn new(store: Arc<dyn SpotlightStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(CachedTerms::default()),
        }
    }

    /// Every (term, entry) pair for `site` and `locale`.
    ///
    /// Loaded from the store on first use and kept until the next sync of
    /// that site and locale. Terms are trimmed and lower-cased; blank terms
    /// are dropped. A load that overlaps an invalidation is returned to its
    /// caller but not cached.
    pub async fn find_terms_by_site(&self, site: &str, locale: &str) -> Result<SpotlightTerms, PipelineError> {
        let key = (site.to_string(), locale.to_string());
        let generation = {
            let cached = self.cached.read().await;
            if let Some(terms) = cached.terms.get(&key) {
                return Ok(terms.clone());
            }
            cached.generations.get(&key).copied().unwrap_or_default()
        };

        let entries = self.store.find_by_site_and_locale(site, locale).await?;
        let terms: SpotlightTerms = Arc::new(
            entries
                .iter()
                .flat_map(|entry| {
                    entry
                        .terms
                        .iter()
                        .map(|term| normalize_term(term))
                        .filter(|term| !term.is_empty())
                        .map(move |term| (term, entry.clone()))
                })
                .collect(),
        );

        let mut cached = self.cached.write().await;
        if cached.generations.get(&key).copied().unwrap_or_default() == generation {
            debug!(site = %site, locale = %locale, terms = terms.len(), "Loaded spotlight terms");
            cached.terms.insert(key, terms.clone());
        } else {
            debug!(site = %site, locale = %locale, "Spotlight terms changed during load, not caching");
        }
        Ok(terms)
    }

    /// Entries whose terms include `term`, compared case-insensitively.
    pub async fn lookup(&self, site: &str, locale: &str, term: &str) -> Result<Vec<SpotlightEntry>, PipelineError> {
        let needle = normalize_term(term);
        let terms = self.find_terms_by_site(site, locale).await?;

        let mut found: Vec<SpotlightEntry> = Vec::new();
        for (candidate, entry) in terms.iter() {
            if *candidate == needle && !found.iter().any(|e| e.id == entry.id) {
                found.push(entry.clone());
            }
        }
        Ok(found)
    }

    /// Drop the cached terms of one site and locale.
    pub async fn invalidate(&self, site: &str, locale: &str) {
        let key = (site.to_string(), locale.to_string());
        let mut cached = self.cached.write().await;
        cached.terms.remove(&key);
        *cached.generations.entry(key).or_default() += 1;
    }

    /// Whether the item carries spotlight content rather than a document.
    pub fn is_spotlight_job(item: &JobItem) -> bool {
        item.item_type().as_deref() == Some(SPOTLIGHT_TYPE)
    }

    /// Remove the externally managed entries the item replaces.
    ///
    /// Returns `true` when the item is spotlight content with an `id`, in
    /// which case the caller inserts the fresh entry. Curated entries are
    /// never touched.
    #[instrument(skip_all, fields(site = %site.name, locale = %item.locale))]
    pub async fn sync_external_spotlight(&self, item: &JobItem, site: &Site) -> Result<bool, PipelineError> {
        if !Self::is_spotlight_job(item) {
            return Ok(false);
        }
        let Some(external_id) = item.id() else {
            warn!("Spotlight job without id, nothing to sync");
            return Ok(false);
        };

        let removed = self.remove_external(&external_id, site, &item.locale).await?;
        debug!(external_id = %external_id, removed = removed, "Synced external spotlight");
        Ok(true)
    }

    /// Delete the externally managed entries for `external_id`.
    pub async fn remove_external(&self, external_id: &str, site: &Site, locale: &str) -> Result<usize, PipelineError> {
        let existing = self
            .store
            .find_managed_externally(external_id, &site.name, locale)
            .await?;

        let removed = if existing.is_empty() {
            0
        } else {
            let ids: Vec<_> = existing.iter().map(|entry| entry.id).collect();
            self.store.delete_all(&ids).await?
        };

        self.invalidate(&site.name, locale).await;
        Ok(removed)
    }

    /// Store a fresh externally managed entry built from `item`.
    pub async fn insert_external(&self, item: &JobItem, site: &Site) -> Result<SpotlightEntry, PipelineError> {
        let external_id = item
            .id()
            .ok_or_else(|| PipelineError::invalid_item("spotlight job without id"))?;
        let entry = Self::entry_from_item(item, site, &external_id);

        self.store.save(entry.clone()).await?;
        self.invalidate(&site.name, &item.locale).await;

        info!(
            site = %site.name,
            locale = %item.locale,
            external_id = %external_id,
            terms = entry.terms.len(),
            "Stored external spotlight"
        );
        Ok(entry)
    }

    fn entry_from_item(item: &JobItem, site: &Site, external_id: &str) -> SpotlightEntry {
        let name = item
            .text_attribute("name")
            .or_else(|| item.text_attribute("title"))
            .unwrap_or_else(|| external_id.to_string());

        let terms: Vec<String> = match item.attributes.get("terms") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_string()).collect(),
            _ => Vec::new(),
        };

        let content = match item.attributes.get("content") {
            Some(value @ Value::Array(_)) => {
                serde_json::from_value::<Vec<SpotlightDocument>>(value.clone()).unwrap_or_else(|e| {
                    warn!(error = %e, "Ignoring malformed spotlight content");
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };

        let mut entry = SpotlightEntry::new(&site.name, &item.locale, name)
            .managed_by(external_id)
            .with_terms(terms);
        entry.description = item.text_attribute("description");
        entry.content = content;
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_indexer_repository::{InMemoryStore, StoreError};
    use content_indexer_shared::{EngineConfig, EngineKind, JobAction};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use uuid::Uuid;

    /// Store whose first read snapshots the entries, then waits for
    /// `release` before returning them.
    struct GatedStore {
        inner: Arc<InMemoryStore>,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new(inner: Arc<InMemoryStore>) -> Self {
            Self {
                inner,
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl SpotlightStore for GatedStore {
        async fn find_by_site_and_locale(&self, site: &str, locale: &str) -> Result<Vec<SpotlightEntry>, StoreError> {
            let snapshot = self.inner.find_by_site_and_locale(site, locale).await?;
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(snapshot)
        }

        async fn find_managed_externally(
            &self,
            external_id: &str,
            site: &str,
            locale: &str,
        ) -> Result<Vec<SpotlightEntry>, StoreError> {
            self.inner.find_managed_externally(external_id, site, locale).await
        }

        async fn delete_all(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
            self.inner.delete_all(ids).await
        }

        async fn save(&self, entry: SpotlightEntry) -> Result<(), StoreError> {
            self.inner.save(entry).await
        }
    }

    fn site() -> Site {
        Site::new(
            "site1",
            EngineConfig {
                kind: EngineKind::OpenSearch,
                url: "http://localhost:9200".into(),
            },
        )
    }

    async fn store_with_entries() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .save(SpotlightEntry::new("site1", "en_US", "curated").with_terms(["Benefits", " HR "]))
            .await
            .unwrap();
        store
            .save(
                SpotlightEntry::new("site1", "en_US", "synced")
                    .managed_by("sp-1")
                    .with_terms(["benefits"]),
            )
            .await
            .unwrap();
        store
            .save(SpotlightEntry::new("site1", "pt_BR", "other-locale").with_terms(["beneficios"]))
            .await
            .unwrap();
        store
    }

    fn spotlight_item(action: JobAction) -> JobItem {
        JobItem::new(action, "site1", "en_US")
            .with_attribute("id", "sp-1")
            .with_attribute("type", SPOTLIGHT_TYPE)
            .with_attribute("name", "Open enrollment")
            .with_attribute("terms", json!(["enrollment", "benefits"]))
            .with_attribute(
                "content",
                json!([{ "position": 1, "title": "Enroll now", "content": "...", "link": "/enroll" }]),
            )
    }

    #[tokio::test]
    async fn test_find_terms_flattens_entries() {
        let cache = SpotlightCache::new(store_with_entries().await);

        let terms = cache.find_terms_by_site("site1", "en_US").await.unwrap();

        let mut flat: Vec<_> = terms.iter().map(|(t, e)| (t.as_str(), e.name.as_str())).collect();
        flat.sort();
        assert_eq!(
            flat,
            vec![("benefits", "curated"), ("benefits", "synced"), ("hr", "curated")]
        );
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let cache = SpotlightCache::new(store_with_entries().await);

        let found = cache.lookup("site1", "en_US", "BENEFITS").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(cache.lookup("site1", "en_US", "payroll").await.unwrap().is_empty());
    }

    #[test]
    fn test_is_spotlight_job() {
        assert!(SpotlightCache::is_spotlight_job(&spotlight_item(JobAction::Create)));
        let page = JobItem::new(JobAction::Create, "site1", "en_US").with_attribute("type", "Page");
        assert!(!SpotlightCache::is_spotlight_job(&page));
    }

    #[tokio::test]
    async fn test_sync_replaces_only_external_entries() {
        let store = store_with_entries().await;
        let cache = SpotlightCache::new(store.clone());
        let item = spotlight_item(JobAction::Create);

        assert!(cache.sync_external_spotlight(&item, &site()).await.unwrap());

        let remaining = store.find_by_site_and_locale("site1", "en_US").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "curated");
    }

    #[tokio::test]
    async fn test_sync_ignores_non_spotlight_items() {
        let store = store_with_entries().await;
        let cache = SpotlightCache::new(store.clone());
        let page = JobItem::new(JobAction::Create, "site1", "en_US").with_attribute("id", "sp-1");

        assert!(!cache.sync_external_spotlight(&page, &site()).await.unwrap());
        assert_eq!(store.spotlights().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_invalidates_terms() {
        let store = store_with_entries().await;
        let cache = SpotlightCache::new(store.clone());
        assert_eq!(cache.lookup("site1", "en_US", "benefits").await.unwrap().len(), 2);

        let item = spotlight_item(JobAction::Create);
        cache.sync_external_spotlight(&item, &site()).await.unwrap();
        cache.insert_external(&item, &site()).await.unwrap();

        let found = cache.lookup("site1", "en_US", "enrollment").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Open enrollment");
        assert!(found[0].is_managed_by("sp-1"));
        assert_eq!(found[0].content[0].title, "Enroll now");
        assert_eq!(found[0].content[0].link.as_deref(), Some("/enroll"));
    }

    #[tokio::test]
    async fn test_load_overlapping_sync_is_not_cached() {
        let inner = Arc::new(InMemoryStore::new());
        inner
            .save(
                SpotlightEntry::new("site1", "en_US", "old")
                    .managed_by("sp-1")
                    .with_terms(["retired"]),
            )
            .await
            .unwrap();
        let store = Arc::new(GatedStore::new(inner));
        let cache = Arc::new(SpotlightCache::new(store.clone()));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.lookup("site1", "en_US", "retired").await })
        };
        store.entered.notified().await;

        let item = spotlight_item(JobAction::Create);
        cache.sync_external_spotlight(&item, &site()).await.unwrap();
        cache.insert_external(&item, &site()).await.unwrap();
        store.release.notify_one();

        // The overlapping reader still sees its own snapshot.
        assert_eq!(reader.await.unwrap().unwrap().len(), 1);

        assert!(cache.lookup("site1", "en_US", "retired").await.unwrap().is_empty());
        let found = cache.lookup("site1", "en_US", "enrollment").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Open enrollment");
    }
}
