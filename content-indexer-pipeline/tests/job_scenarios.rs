//! End-to-end job handling through `JobQueueConsumer::receive`, backed by
//! the in-memory search backend and store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use content_indexer_pipeline::enrichment::{NlpService, ThesaurusService};
use content_indexer_pipeline::{EnrichmentPipeline, JobQueueConsumer, PipelineError, SpotlightCache};
use content_indexer_repository::{
    BackendOperation, InMemoryBackend, InMemoryBackendFactory, InMemoryStore, SearchBackendGateway,
    SpotlightStore,
};
use content_indexer_shared::{
    Attributes, EngineConfig, EngineKind, FieldSpec, JobAction, JobBatch, JobItem, MergeRule, Site,
    SiteLocale, SpotlightEntry,
};

struct Harness {
    factory: Arc<InMemoryBackendFactory>,
    store: Arc<InMemoryStore>,
    consumer: JobQueueConsumer,
}

impl Harness {
    fn new(site: Site, enrichment: EnrichmentPipeline) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.add_site(site);
        let factory = Arc::new(InMemoryBackendFactory::new());
        let gateway = Arc::new(SearchBackendGateway::new(factory.clone()));
        let consumer = JobQueueConsumer::new(
            store.clone(),
            gateway,
            Arc::new(enrichment),
            Arc::new(SpotlightCache::new(store.clone())),
        );

        Self {
            factory,
            store,
            consumer,
        }
    }

    fn backend(&self) -> Arc<InMemoryBackend> {
        self.factory.backend("site1_en_us").expect("backend was created")
    }

    fn operations(&self) -> Vec<BackendOperation> {
        self.factory
            .backend("site1_en_us")
            .map(|backend| backend.operations())
            .unwrap_or_default()
    }

    async fn run(&self, items: Vec<JobItem>) {
        self.consumer.receive(JobBatch::new(items)).await;
    }
}

fn site1() -> Site {
    let mut site = Site::new(
        "site1",
        EngineConfig {
            kind: EngineKind::OpenSearch,
            url: "http://localhost:9200".into(),
        },
    );
    site.locales.push(SiteLocale::new("en_US"));
    site
}

fn item(action: JobAction) -> JobItem {
    JobItem::new(action, "site1", "en_US")
}

#[tokio::test]
async fn create_indexes_consolidated_attributes_once() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());

    harness.run(vec![item(JobAction::Create).with_attribute("id", "1")]).await;

    assert_eq!(harness.operations(), vec![BackendOperation::Index("1".into())]);
    assert_eq!(
        harness.backend().document("1"),
        Some(Attributes::new().with("id", "1"))
    );
}

#[tokio::test]
async fn delete_by_id_deindexes_once() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());

    harness.run(vec![item(JobAction::Delete).with_attribute("id", "1")]).await;

    assert_eq!(harness.operations(), vec![BackendOperation::DeleteById("1".into())]);
}

#[tokio::test]
async fn delete_prefers_id_over_type() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());

    harness
        .run(vec![
            item(JobAction::Delete)
                .with_attribute("id", "1")
                .with_attribute("type", "Page"),
            item(JobAction::Delete).with_attribute("type", "Page"),
        ])
        .await;

    assert_eq!(
        harness.operations(),
        vec![
            BackendOperation::DeleteById("1".into()),
            BackendOperation::DeleteByType("Page".into()),
        ]
    );
}

#[tokio::test]
async fn commit_makes_no_other_backend_call() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());

    harness
        .run(vec![item(JobAction::Commit).with_attribute("id", "ignored")])
        .await;

    assert_eq!(harness.operations(), vec![BackendOperation::Commit]);
}

#[tokio::test]
async fn spotlight_sync_replaces_external_entries() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());
    for name in ["old-a", "old-b"] {
        harness
            .store
            .save(SpotlightEntry::new("site1", "en_US", name).managed_by("sp-1"))
            .await
            .unwrap();
    }
    harness
        .store
        .save(SpotlightEntry::new("site1", "en_US", "curated"))
        .await
        .unwrap();

    harness
        .run(vec![item(JobAction::Create)
            .with_attribute("id", "sp-1")
            .with_attribute("type", "TUR_SPOTLIGHT")
            .with_attribute("name", "New")
            .with_attribute("terms", "alpha, beta")])
        .await;

    let mut names: Vec<String> = harness
        .store
        .spotlights()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["New".to_string(), "curated".to_string()]);
    assert!(harness.operations().is_empty());
}

#[tokio::test]
async fn unknown_site_does_not_reach_backend() {
    let harness = Harness::new(site1(), EnrichmentPipeline::passthrough());

    harness
        .run(vec![JobItem::new(JobAction::Create, "site2", "en_US").with_attribute("id", "1")])
        .await;

    assert!(harness.operations().is_empty());
}

struct PeopleExtractor;

#[async_trait]
impl NlpService for PeopleExtractor {
    async fn extract(&self, _instance: &str, attributes: &Attributes) -> Result<Attributes, PipelineError> {
        assert!(attributes.contains_key("text"));
        assert!(!attributes.contains_key("id"));
        Ok(Attributes::new().with("people", vec!["Ada", "Bob", "Ada"]))
    }
}

struct FailingThesaurus;

#[async_trait]
impl ThesaurusService for FailingThesaurus {
    async fn detect_terms(&self, _attributes: &Attributes) -> Result<Attributes, PipelineError> {
        Err(PipelineError::enrichment("thesaurus down"))
    }
}

#[tokio::test]
async fn create_indexes_enriched_and_deduped_document() {
    let mut site = site1();
    site.locales[0].nlp_instance = Some("nlp-1".into());
    site.field_specs.push(FieldSpec::new("text").with_nlp());
    site.thesaurus_enabled = true;
    let enrichment = EnrichmentPipeline::new(Some(Arc::new(PeopleExtractor)), Some(Arc::new(FailingThesaurus)));
    let harness = Harness::new(site, enrichment);

    harness
        .run(vec![item(JobAction::Create)
            .with_attribute("id", "1")
            .with_attribute("text", "Ada met Bob")
            .with_attribute("tags", json!(["x", "x", "y"]))])
        .await;

    let document = harness.backend().document("1").expect("document indexed");
    let mut people = document.get_string_list("people");
    people.sort();
    assert_eq!(people, vec!["Ada".to_string(), "Bob".to_string()]);
    let mut tags = document.get_string_list("tags");
    tags.sort();
    assert_eq!(tags, vec!["x".to_string(), "y".to_string()]);
}

#[tokio::test]
async fn create_overlays_counterpart_fields() {
    let mut site = site1();
    site.merge_rules.push(MergeRule {
        provider_from: "CMS".into(),
        provider_to: "DAM".into(),
        relation_field_from: "asset_id".into(),
        relation_field_to: "id".into(),
        overwritten_fields: vec!["title".into()],
        locale: None,
    });
    let harness = Harness::new(site, EnrichmentPipeline::passthrough());

    harness
        .run(vec![
            item(JobAction::Create)
                .with_attribute("id", "asset-9")
                .with_attribute("source_apps", "DAM")
                .with_attribute("title", "Asset title")
                .with_attribute("author", "dam"),
            item(JobAction::Create)
                .with_attribute("id", "page-1")
                .with_attribute("source_apps", "CMS")
                .with_attribute("asset_id", "asset-9")
                .with_attribute("title", "Page title")
                .with_attribute("author", "cms"),
        ])
        .await;

    let page = harness.backend().document("page-1").expect("page indexed");
    assert_eq!(page.get_str("title"), Some("Asset title"));
    assert_eq!(page.get_str("author"), Some("cms"));
    let asset = harness.backend().document("asset-9").expect("asset indexed");
    assert_eq!(asset.get_str("title"), Some("Asset title"));
}
