//! Search backend gateway.
//!
//! Owns the per-(site, locale, core) backend instances and exposes the
//! index/deindex/commit/query primitives the pipeline uses. Instances are
//! created lazily through a [`BackendFactory`] and memoized; every backend
//! call is bounded by [`GatewayConfig::call_timeout`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::errors::SearchError;
use crate::interfaces::{BackendFactory, SearchBackend};
use crate::query::{shape_results, BackendQuery};
use content_indexer_shared::{
    Attributes, SearchHit, SearchParams, SearchResults, Site, SiteLocale,
};

/// Address of a backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub site: String,
    pub locale: String,
    pub core: String,
}

/// A live, cached handle to the search backend for one (site, locale, core).
#[derive(Clone)]
pub struct BackendInstance {
    key: InstanceKey,
    rows_per_page: u32,
    backend: Arc<dyn SearchBackend>,
}

impl BackendInstance {
    pub fn new(key: InstanceKey, rows_per_page: u32, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            key,
            rows_per_page,
            backend,
        }
    }

    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    /// Default page size of the owning site.
    pub fn rows_per_page(&self) -> u32 {
        self.rows_per_page
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }
}

impl fmt::Debug for BackendInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendInstance")
            .field("key", &self.key)
            .field("backend", &self.backend.name())
            .finish()
    }
}

type InstanceSlot = Arc<OnceCell<BackendInstance>>;

/// Gateway to the pluggable search backend.
///
/// The instance cache holds one slot per key. Concurrent resolutions of the
/// same key wait on that slot, so at most one connection is ever built per
/// key; a failed construction leaves the slot empty for the next attempt.
pub struct SearchBackendGateway {
    factory: Arc<dyn BackendFactory>,
    config: GatewayConfig,
    instances: Mutex<HashMap<InstanceKey, InstanceSlot>>,
    available: AtomicBool,
}

impl SearchBackendGateway {
    /// Create a new gateway with default configuration.
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self::with_config(factory, GatewayConfig::default())
    }

    /// Create a new gateway with custom configuration.
    pub fn with_config(factory: Arc<dyn BackendFactory>, config: GatewayConfig) -> Self {
        Self {
            factory,
            config,
            instances: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Resolve the instance for `site` and `locale`, using the locale's
    /// configured core.
    ///
    /// Returns `None` if the site has no such locale or the backend cannot be
    /// constructed; the cause is logged.
    pub async fn resolve_instance(&self, site: &Site, locale: &str) -> Option<BackendInstance> {
        let Some(site_locale) = site.locale(locale) else {
            warn!(site = %site.name, locale = %locale, "Site has no such locale");
            return None;
        };
        let core = site_locale.core_name(&site.name);
        self.resolve_instance_for_core(site, site_locale, &core)
            .await
    }

    /// Resolve the instance for an explicit core.
    pub async fn resolve_instance_for_core(
        &self,
        site: &Site,
        locale: &SiteLocale,
        core: &str,
    ) -> Option<BackendInstance> {
        let key = InstanceKey {
            site: site.name.clone(),
            locale: locale.language.clone(),
            core: core.to_string(),
        };

        let slot = {
            let mut instances = self.instances.lock().await;
            instances.entry(key.clone()).or_default().clone()
        };

        let resolved = slot
            .get_or_try_init(|| async {
                let backend = self
                    .bounded("connect", self.factory.connect(site, locale, core))
                    .await?;
                info!(
                    site = %key.site,
                    locale = %key.locale,
                    core = %key.core,
                    backend = %backend.name(),
                    "Created search backend instance"
                );
                Ok::<_, SearchError>(BackendInstance::new(
                    key.clone(),
                    site.rows_per_page,
                    backend,
                ))
            })
            .await;

        match resolved {
            Ok(instance) => Some(instance.clone()),
            Err(e) => {
                error!(
                    site = %key.site,
                    locale = %key.locale,
                    core = %key.core,
                    error = %e,
                    "Failed to create search backend instance"
                );
                None
            }
        }
    }

    /// Index a document. The attributes must carry an `id`.
    #[instrument(skip_all, fields(site = %site.name, core = %instance.key.core))]
    pub async fn index(
        &self,
        instance: &BackendInstance,
        site: &Site,
        attributes: &Attributes,
    ) -> Result<(), SearchError> {
        if instance.key.site != site.name {
            return Err(SearchError::invalid_document(format!(
                "instance for site {} used for site {}",
                instance.key.site, site.name
            )));
        }
        let id = attributes
            .document_id()
            .ok_or_else(|| SearchError::invalid_document("missing or ambiguous id attribute"))?;

        self.bounded("index", instance.backend.index_document(&id, attributes))
            .await?;

        debug!(id = %id, fields = attributes.len(), "Document indexed");
        Ok(())
    }

    #[instrument(skip(self, instance), fields(core = %instance.key.core))]
    pub async fn deindex_by_id(&self, instance: &BackendInstance, id: &str) -> Result<(), SearchError> {
        self.bounded("deindex_by_id", instance.backend.delete_by_id(id))
            .await?;
        debug!("Document deindexed");
        Ok(())
    }

    #[instrument(skip(self, instance), fields(core = %instance.key.core))]
    pub async fn deindex_by_type(
        &self,
        instance: &BackendInstance,
        doc_type: &str,
    ) -> Result<(), SearchError> {
        self.bounded("deindex_by_type", instance.backend.delete_by_type(doc_type))
            .await?;
        debug!("Documents deindexed by type");
        Ok(())
    }

    #[instrument(skip(self, instance), fields(core = %instance.key.core))]
    pub async fn commit(&self, instance: &BackendInstance) -> Result<(), SearchError> {
        self.bounded("commit", instance.backend.commit()).await?;
        info!("Committed pending changes");
        Ok(())
    }

    /// Run a search and shape the answer into [`SearchResults`].
    #[instrument(skip(self, instance), fields(core = %instance.key.core))]
    pub async fn search(
        &self,
        instance: &BackendInstance,
        params: &SearchParams,
    ) -> Result<SearchResults, SearchError> {
        let started = Instant::now();
        let query = BackendQuery::translate(params, instance.rows_per_page);
        let response = self
            .bounded("search", instance.backend.search(&query))
            .await?;

        Ok(shape_results(params, &query, response, started.elapsed()))
    }

    /// Fetch the first document matching every `(field, value)` filter.
    pub async fn find_one(
        &self,
        instance: &BackendInstance,
        filters: Vec<(String, String)>,
    ) -> Result<Option<SearchHit>, SearchError> {
        let query = BackendQuery::lookup(filters);
        let response = self
            .bounded("find_one", instance.backend.search(&query))
            .await?;
        Ok(response.hits.into_iter().next())
    }

    /// Last availability observed from backend calls.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Probe every cached instance.
    ///
    /// Instances that fail the probe are evicted so the next resolution
    /// reconnects them. The backend counts as available when at least one
    /// instance answered healthy. With nothing cached there is nothing known
    /// to be down, so the answer is `true` and the next resolution gets to
    /// try again.
    pub async fn check_health(&self) -> bool {
        let cached: Vec<(InstanceSlot, BackendInstance)> = {
            let slots = self.instances.lock().await;
            slots
                .values()
                .filter_map(|slot| slot.get().cloned().map(|instance| (slot.clone(), instance)))
                .collect()
        };
        if cached.is_empty() {
            self.available.store(true, Ordering::SeqCst);
            return true;
        }

        let mut healthy = 0;
        let mut failed = Vec::new();
        for (slot, instance) in cached {
            match self
                .bounded("health_check", instance.backend.health_check())
                .await
            {
                Ok(true) => healthy += 1,
                Ok(false) => {
                    warn!(core = %instance.key.core, "Search backend reports unhealthy");
                    failed.push((slot, instance.key));
                }
                Err(e) => {
                    warn!(core = %instance.key.core, error = %e, "Search backend health check failed");
                    failed.push((slot, instance.key));
                }
            }
        }

        if !failed.is_empty() {
            let mut slots = self.instances.lock().await;
            for (slot, key) in failed {
                // Leave the key alone if it was rebuilt while probing.
                if slots.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    slots.remove(&key);
                    info!(site = %key.site, core = %key.core, "Evicted unhealthy backend instance");
                }
            }
        }

        let available = healthy > 0;
        self.available.store(available, Ordering::SeqCst);
        available
    }

    /// Drop every cached instance of `site`, e.g. after its configuration changed.
    pub async fn invalidate_site(&self, site: &str) {
        let mut instances = self.instances.lock().await;
        instances.retain(|key, _| key.site != site);
    }

    /// Number of live instances in the cache.
    pub async fn instance_count(&self) -> usize {
        let instances = self.instances.lock().await;
        instances.values().filter(|slot| slot.initialized()).count()
    }

    /// Run a backend call under the configured timeout and record whether
    /// the backend looked available.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, SearchError>
    where
        F: Future<Output = Result<T, SearchError>>,
    {
        let result = match timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::timeout(
                operation,
                self.config.call_timeout.as_secs(),
            )),
        };

        match &result {
            Ok(_) => self.available.store(true, Ordering::SeqCst),
            Err(e) if e.is_unavailable() => {
                if self.available.swap(false, Ordering::SeqCst) {
                    warn!(operation = %operation, error = %e, "Search backend marked unavailable");
                }
            }
            Err(_) => {}
        }

        result
    }
}
