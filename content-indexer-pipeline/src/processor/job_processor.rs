//! Job queue consumer: runs the CREATE/DELETE/COMMIT state machine for
//! every item of a batch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::enrichment::{dedupe, EnrichmentPipeline};
use crate::errors::PipelineError;
use crate::merge::MergeProviderProcess;
use crate::spotlight::SpotlightCache;
use content_indexer_repository::{BackendInstance, SearchBackendGateway, SiteStore};
use content_indexer_shared::{JobAction, JobBatch, JobItem, Site};

/// Raised when an item failed because the search backend is down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSignal {
    pub site: String,
    pub locale: String,
    pub reason: String,
}

/// What happened to the items of one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub indexed: usize,
    pub deleted: usize,
    pub committed: usize,
    pub spotlights: usize,
    /// Items whose site is not configured.
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.indexed + self.deleted + self.committed + self.spotlights + self.skipped + self.failed
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Indexed => self.indexed += 1,
            ItemOutcome::Deleted => self.deleted += 1,
            ItemOutcome::Committed => self.committed += 1,
            ItemOutcome::Spotlight => self.spotlights += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Indexed,
    Deleted,
    Committed,
    Spotlight,
}

/// Processes job batches item by item.
///
/// A failing item is logged and counted; it never stops the rest of the
/// batch. Failures caused by an unavailable backend are also reported on the
/// signal channel, if one is attached.
pub struct JobQueueConsumer {
    sites: Arc<dyn SiteStore>,
    gateway: Arc<SearchBackendGateway>,
    enrichment: Arc<EnrichmentPipeline>,
    merge: MergeProviderProcess,
    spotlights: Arc<SpotlightCache>,
    signals: Option<mpsc::Sender<BackendSignal>>,
}

impl JobQueueConsumer {
    pub fn new(
        sites: Arc<dyn SiteStore>,
        gateway: Arc<SearchBackendGateway>,
        enrichment: Arc<EnrichmentPipeline>,
        spotlights: Arc<SpotlightCache>,
    ) -> Self {
        Self {
            sites,
            merge: MergeProviderProcess::new(gateway.clone()),
            gateway,
            enrichment,
            spotlights,
            signals: None,
        }
    }

    /// Report backend outages on `sender`.
    pub fn with_signals(mut self, sender: mpsc::Sender<BackendSignal>) -> Self {
        self.signals = Some(sender);
        self
    }

    #[instrument(skip_all, fields(items = batch.len()))]
    pub async fn receive(&self, batch: JobBatch) -> BatchReport {
        let mut report = BatchReport::default();

        for item in batch {
            match self.process_item(&item).await {
                Ok(outcome) => report.record(outcome),
                Err(PipelineError::SiteNotFound(site)) => {
                    warn!(site = %site, action = ?item.action, "Site not found, skipping item");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(
                        action = ?item.action,
                        id = item.id().as_deref().unwrap_or("-"),
                        error = %e,
                        "Failed to process job item"
                    );
                    report.failed += 1;
                    self.signal_if_unavailable(&item, &e);
                }
            }
        }

        info!(
            indexed = report.indexed,
            deleted = report.deleted,
            committed = report.committed,
            spotlights = report.spotlights,
            skipped = report.skipped,
            failed = report.failed,
            "Batch processed"
        );
        report
    }

    async fn process_item(&self, item: &JobItem) -> Result<ItemOutcome, PipelineError> {
        let site_name = item
            .site_name()
            .ok_or_else(|| PipelineError::invalid_item("item names no site"))?;
        let site = self
            .sites
            .find_site_by_name(site_name)
            .await?
            .ok_or_else(|| PipelineError::site_not_found(site_name))?;

        match item.action {
            JobAction::Create if SpotlightCache::is_spotlight_job(item) => {
                self.create_spotlight(item, &site).await
            }
            JobAction::Create => self.create(item, &site).await,
            JobAction::Delete if SpotlightCache::is_spotlight_job(item) => {
                self.delete_spotlight(item, &site).await
            }
            JobAction::Delete => self.delete(item, &site).await,
            JobAction::Commit => self.commit(item, &site).await,
        }
    }

    async fn create(&self, item: &JobItem, site: &Site) -> Result<ItemOutcome, PipelineError> {
        let instance = self.instance(site, &item.locale).await?;

        let attributes = self.enrichment.enrich(item, site).await;
        let attributes = self.merge.merge(site, attributes, &item.locale).await;
        let attributes = dedupe(attributes);

        self.gateway.index(&instance, site, &attributes).await?;
        Ok(ItemOutcome::Indexed)
    }

    async fn delete(&self, item: &JobItem, site: &Site) -> Result<ItemOutcome, PipelineError> {
        let instance = self.instance(site, &item.locale).await?;

        if let Some(id) = item.id() {
            self.gateway.deindex_by_id(&instance, &id).await?;
        } else if let Some(doc_type) = item.item_type() {
            self.gateway.deindex_by_type(&instance, &doc_type).await?;
        } else {
            return Err(PipelineError::invalid_item("DELETE without id or type"));
        }
        Ok(ItemOutcome::Deleted)
    }

    async fn commit(&self, item: &JobItem, site: &Site) -> Result<ItemOutcome, PipelineError> {
        let instance = self.instance(site, &item.locale).await?;
        self.gateway.commit(&instance).await?;
        Ok(ItemOutcome::Committed)
    }

    /// Spotlight content goes to the spotlight store, not the search backend.
    async fn create_spotlight(&self, item: &JobItem, site: &Site) -> Result<ItemOutcome, PipelineError> {
        if self.spotlights.sync_external_spotlight(item, site).await? {
            self.spotlights.insert_external(item, site).await?;
        }
        Ok(ItemOutcome::Spotlight)
    }

    async fn delete_spotlight(&self, item: &JobItem, site: &Site) -> Result<ItemOutcome, PipelineError> {
        let external_id = item
            .id()
            .ok_or_else(|| PipelineError::invalid_item("spotlight DELETE without id"))?;
        let removed = self
            .spotlights
            .remove_external(&external_id, site, &item.locale)
            .await?;

        debug!(external_id = %external_id, removed = removed, "Removed external spotlight");
        Ok(ItemOutcome::Spotlight)
    }

    async fn instance(&self, site: &Site, locale: &str) -> Result<BackendInstance, PipelineError> {
        self.gateway
            .resolve_instance(site, locale)
            .await
            .ok_or_else(|| PipelineError::instance_unavailable(&site.name, locale))
    }

    fn signal_if_unavailable(&self, item: &JobItem, error: &PipelineError) {
        let Some(signals) = &self.signals else {
            return;
        };

        let backend_down = error.is_backend_unavailable()
            || (matches!(error, PipelineError::InstanceUnavailable { .. })
                && !self.gateway.is_available());
        if !backend_down {
            return;
        }

        let signal = BackendSignal {
            site: item.site_name().unwrap_or_default().to_string(),
            locale: item.locale.clone(),
            reason: error.to_string(),
        };
        // A full channel already carries an outage signal.
        if signals.try_send(signal).is_err() {
            debug!("Backend signal channel full or closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_indexer_repository::{
        BackendOperation, InMemoryBackendFactory, InMemoryStore, SpotlightStore,
    };
    use content_indexer_shared::{EngineConfig, EngineKind, SiteLocale, SpotlightEntry};

    struct Fixture {
        factory: Arc<InMemoryBackendFactory>,
        store: Arc<InMemoryStore>,
        consumer: JobQueueConsumer,
    }

    fn fixture() -> Fixture {
        let mut site = Site::new(
            "site1",
            EngineConfig {
                kind: EngineKind::OpenSearch,
                url: "http://localhost:9200".into(),
            },
        );
        site.locales.push(SiteLocale::new("en_US"));

        let store = Arc::new(InMemoryStore::new());
        store.add_site(site);
        let factory = Arc::new(InMemoryBackendFactory::new());
        let gateway = Arc::new(SearchBackendGateway::new(factory.clone()));
        let consumer = JobQueueConsumer::new(
            store.clone(),
            gateway,
            Arc::new(EnrichmentPipeline::passthrough()),
            Arc::new(SpotlightCache::new(store.clone())),
        );

        Fixture {
            factory,
            store,
            consumer,
        }
    }

    fn operations(fixture: &Fixture) -> Vec<BackendOperation> {
        fixture
            .factory
            .backend("site1_en_us")
            .map(|backend| backend.operations())
            .unwrap_or_default()
    }

    fn create(id: &str) -> JobItem {
        JobItem::new(JobAction::Create, "site1", "en_US").with_attribute("id", id)
    }

    #[tokio::test]
    async fn test_unknown_site_is_skipped_and_batch_continues() {
        let fixture = fixture();
        let batch = JobBatch::new(vec![
            JobItem::new(JobAction::Create, "nowhere", "en_US").with_attribute("id", "0"),
            create("1"),
        ]);

        let report = fixture.consumer.receive(batch).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.indexed, 1);
        assert_eq!(operations(&fixture), vec![BackendOperation::Index("1".into())]);
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_batch() {
        let fixture = fixture();
        let batch = JobBatch::new(vec![
            JobItem::new(JobAction::Create, "site1", "en_US").with_attribute("title", "no id"),
            JobItem::new(JobAction::Delete, "site1", "en_US"),
            create("2"),
        ]);

        let report = fixture.consumer.receive(batch).await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn test_items_are_processed_in_order() {
        let fixture = fixture();
        let batch = JobBatch::new(vec![
            create("1"),
            JobItem::new(JobAction::Delete, "site1", "en_US").with_attribute("id", "1"),
            JobItem::new(JobAction::Commit, "site1", "en_US"),
        ]);

        fixture.consumer.receive(batch).await;

        assert_eq!(
            operations(&fixture),
            vec![
                BackendOperation::Index("1".into()),
                BackendOperation::DeleteById("1".into()),
                BackendOperation::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_locale_fails_item() {
        let fixture = fixture();
        let item = JobItem::new(JobAction::Commit, "site1", "fr_FR");

        let report = fixture.consumer.receive(JobBatch::new(vec![item])).await;

        assert_eq!(report.failed, 1);
        assert!(fixture.factory.backend("site1_fr_fr").is_none());
    }

    #[tokio::test]
    async fn test_backend_outage_is_signalled() {
        let fixture = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let Fixture {
            factory,
            consumer,
            ..
        } = fixture;
        let consumer = consumer.with_signals(tx);

        consumer.receive(JobBatch::new(vec![create("1")])).await;
        factory.backend("site1_en_us").unwrap().set_available(false);
        let report = consumer.receive(JobBatch::new(vec![create("2")])).await;

        assert_eq!(report.failed, 1);
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.site, "site1");
        assert_eq!(signal.locale, "en_US");
    }

    #[tokio::test]
    async fn test_rejected_document_is_not_signalled() {
        let fixture = fixture();
        let (tx, mut rx) = mpsc::channel(4);
        let consumer = fixture.consumer.with_signals(tx);

        let item = JobItem::new(JobAction::Create, "site1", "en_US").with_attribute("title", "no id");
        consumer.receive(JobBatch::new(vec![item])).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spotlight_create_bypasses_backend() {
        let fixture = fixture();
        fixture
            .store
            .save(SpotlightEntry::new("site1", "en_US", "stale").managed_by("sp-1"))
            .await
            .unwrap();
        let item = create("sp-1")
            .with_attribute("type", "TUR_SPOTLIGHT")
            .with_attribute("name", "Fresh")
            .with_attribute("terms", serde_json::json!(["fresh"]));

        let report = fixture.consumer.receive(JobBatch::new(vec![item])).await;

        assert_eq!(report.spotlights, 1);
        assert!(operations(&fixture).is_empty());
        let entries = fixture.store.spotlights();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Fresh");
    }

    #[tokio::test]
    async fn test_spotlight_delete_removes_external_entries() {
        let fixture = fixture();
        fixture
            .store
            .save(SpotlightEntry::new("site1", "en_US", "ext").managed_by("sp-1"))
            .await
            .unwrap();
        fixture
            .store
            .save(SpotlightEntry::new("site1", "en_US", "curated"))
            .await
            .unwrap();
        let item = JobItem::new(JobAction::Delete, "site1", "en_US")
            .with_attribute("id", "sp-1")
            .with_attribute("type", "TUR_SPOTLIGHT");

        fixture.consumer.receive(JobBatch::new(vec![item])).await;

        let entries = fixture.store.spotlights();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "curated");
        assert!(operations(&fixture).is_empty());
    }
}
