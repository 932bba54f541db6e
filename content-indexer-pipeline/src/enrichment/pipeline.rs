use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::enrichment::{NlpService, ThesaurusService};
use crate::errors::PipelineError;
use content_indexer_shared::{Attributes, JobItem, Site};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the enrichment pipeline.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Upper bound on a single NLP or thesaurus call.
    pub call_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Return `attributes` with every list value reduced to its distinct elements.
pub fn dedupe(mut attributes: Attributes) -> Attributes {
    attributes.dedupe_lists();
    attributes
}

/// Consolidate, enrich and dedupe the attributes of a CREATE item.
///
/// NLP and thesaurus failures never reach the caller: the step is logged and
/// skipped, leaving the attributes as they were before it.
pub struct EnrichmentPipeline {
    nlp: Option<Arc<dyn NlpService>>,
    thesaurus: Option<Arc<dyn ThesaurusService>>,
    config: EnrichmentConfig,
}

impl EnrichmentPipeline {
    pub fn new(
        nlp: Option<Arc<dyn NlpService>>,
        thesaurus: Option<Arc<dyn ThesaurusService>>,
    ) -> Self {
        Self::with_config(nlp, thesaurus, EnrichmentConfig::default())
    }

    pub fn with_config(
        nlp: Option<Arc<dyn NlpService>>,
        thesaurus: Option<Arc<dyn ThesaurusService>>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            nlp,
            thesaurus,
            config,
        }
    }

    /// A pipeline that only consolidates and dedupes.
    pub fn passthrough() -> Self {
        Self::new(None, None)
    }

    #[instrument(skip_all, fields(site = %site.name, locale = %item.locale))]
    pub async fn enrich(&self, item: &JobItem, site: &Site) -> Attributes {
        let mut attributes = Self::consolidate(item);

        if let Some(additions) = self.nlp_step(item, site, &attributes).await {
            attributes.merge(additions);
        }

        if let Some(additions) = self.thesaurus_step(site, &attributes).await {
            attributes.merge(additions);
        }

        dedupe(attributes)
    }

    /// Copy every non-null attribute, typed by the item's field specs.
    fn consolidate(item: &JobItem) -> Attributes {
        let mut attributes = Attributes::from_json_map(item.attributes.clone());
        attributes.conform(&item.field_specs);
        attributes
    }

    async fn nlp_step(&self, item: &JobItem, site: &Site, attributes: &Attributes) -> Option<Attributes> {
        let nlp = self.nlp.as_ref()?;
        let instance = site.locale(&item.locale)?.nlp_instance.as_deref()?;

        let subset = attributes.select(|key| site.is_nlp_field(key));
        if subset.is_empty() {
            debug!("No NLP-enabled attributes, skipping NLP");
            return None;
        }

        match self.bounded(nlp.extract(instance, &subset)).await {
            Ok(additions) => Some(additions),
            Err(e) => {
                warn!(instance = %instance, error = %e, "NLP enrichment failed, continuing without it");
                None
            }
        }
    }

    async fn thesaurus_step(&self, site: &Site, attributes: &Attributes) -> Option<Attributes> {
        if !site.thesaurus_enabled {
            return None;
        }
        let thesaurus = self.thesaurus.as_ref()?;

        match self.bounded(thesaurus.detect_terms(attributes)).await {
            Ok(additions) => Some(additions),
            Err(e) => {
                warn!(error = %e, "Thesaurus enrichment failed, continuing without it");
                None
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<Attributes, PipelineError>
    where
        F: Future<Output = Result<Attributes, PipelineError>>,
    {
        timeout(self.config.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(PipelineError::enrichment(format!(
                    "call timed out after {}s",
                    self.config.call_timeout.as_secs()
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_indexer_shared::{
        EngineConfig, EngineKind, FieldSpec, FieldType, JobAction, JobFieldSpec, SiteLocale,
    };
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockNlp {
        calls: Mutex<Vec<(String, Attributes)>>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl NlpService for MockNlp {
        async fn extract(&self, instance: &str, attributes: &Attributes) -> Result<Attributes, PipelineError> {
            self.calls
                .lock()
                .await
                .push((instance.to_string(), attributes.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(PipelineError::enrichment("nlp down"));
            }
            Ok(Attributes::new()
                .with("person", vec!["Ada", "Ada", "Grace"])
                .with("text", "rewritten"))
        }
    }

    #[derive(Default)]
    struct MockThesaurus {
        seen: Mutex<Vec<Attributes>>,
        fail: bool,
    }

    #[async_trait]
    impl ThesaurusService for MockThesaurus {
        async fn detect_terms(&self, attributes: &Attributes) -> Result<Attributes, PipelineError> {
            self.seen.lock().await.push(attributes.clone());
            if self.fail {
                return Err(PipelineError::enrichment("thesaurus down"));
            }
            Ok(Attributes::new().with("subjects", vec!["Finance"]))
        }
    }

    fn site(nlp_instance: Option<&str>, thesaurus: bool) -> Site {
        let mut site = Site::new(
            "site1",
            EngineConfig {
                kind: EngineKind::OpenSearch,
                url: "http://localhost:9200".into(),
            },
        );
        let mut locale = SiteLocale::new("en_US");
        locale.nlp_instance = nlp_instance.map(str::to_string);
        site.locales.push(locale);
        site.thesaurus_enabled = thesaurus;
        site.field_specs.push(FieldSpec::new("text").with_nlp());
        site.field_specs.push(FieldSpec::new("title"));
        site
    }

    fn item() -> JobItem {
        JobItem::new(JobAction::Create, "site1", "en_US")
            .with_attribute("id", "1")
            .with_attribute("title", "Hello")
            .with_attribute("text", "Ada met Grace")
            .with_attribute("tags", json!(["a", "b", "a"]))
            .with_attribute("empty", json!(null))
    }

    #[tokio::test]
    async fn test_consolidate_drops_nulls_and_dedupes() {
        let attributes = EnrichmentPipeline::passthrough()
            .enrich(&item(), &site(None, false))
            .await;

        assert!(!attributes.contains_key("empty"));
        assert_eq!(attributes.get_string_list("tags"), vec!["a", "b"]);
        assert_eq!(attributes.get_str("title"), Some("Hello"));
    }

    #[tokio::test]
    async fn test_consolidate_applies_field_specs() {
        let item = item()
            .with_attribute("views", "42")
            .with_field_spec(JobFieldSpec::new("views", FieldType::Int))
            .with_field_spec(JobFieldSpec::new("title", FieldType::String).multi_valued());

        let attributes = EnrichmentPipeline::passthrough()
            .enrich(&item, &site(None, false))
            .await;

        assert_eq!(attributes.get_i64("views"), Some(42));
        assert_eq!(attributes.get_string_list("title"), vec!["Hello"]);
        assert!(attributes.get("title").unwrap().is_list());
    }

    #[tokio::test]
    async fn test_nlp_gets_only_enabled_fields_and_results_merge() {
        let nlp = Arc::new(MockNlp::default());
        let pipeline = EnrichmentPipeline::new(Some(nlp.clone()), None);

        let attributes = pipeline.enrich(&item(), &site(Some("opennlp-en"), false)).await;

        let calls = nlp.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "opennlp-en");
        assert_eq!(calls[0].1.keys().collect::<Vec<_>>(), vec!["text"]);

        assert_eq!(attributes.get_string_list("person"), vec!["Ada", "Grace"]);
        assert_eq!(attributes.get_str("text"), Some("rewritten"));
        assert_eq!(attributes.get_str("title"), Some("Hello"));
    }

    #[tokio::test]
    async fn test_nlp_skipped_without_instance() {
        let nlp = Arc::new(MockNlp::default());
        let pipeline = EnrichmentPipeline::new(Some(nlp.clone()), None);

        pipeline.enrich(&item(), &site(None, false)).await;

        assert!(nlp.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_nlp_failure_leaves_consolidated_attributes() {
        let nlp = Arc::new(MockNlp {
            fail: true,
            ..Default::default()
        });
        let site = site(Some("opennlp-en"), false);

        let enriched = EnrichmentPipeline::new(Some(nlp), None)
            .enrich(&item(), &site)
            .await;
        let baseline = EnrichmentPipeline::passthrough().enrich(&item(), &site).await;

        assert_eq!(enriched, baseline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nlp_timeout_is_a_failure() {
        let nlp = Arc::new(MockNlp {
            delay: Some(Duration::from_secs(120)),
            ..Default::default()
        });
        let pipeline = EnrichmentPipeline::with_config(
            Some(nlp),
            None,
            EnrichmentConfig {
                call_timeout: Duration::from_secs(1),
            },
        );

        let attributes = pipeline.enrich(&item(), &site(Some("opennlp-en"), false)).await;

        assert!(!attributes.contains_key("person"));
        assert_eq!(attributes.get_str("text"), Some("Ada met Grace"));
    }

    #[tokio::test]
    async fn test_thesaurus_sees_nlp_results() {
        let nlp = Arc::new(MockNlp::default());
        let thesaurus = Arc::new(MockThesaurus::default());
        let pipeline = EnrichmentPipeline::new(Some(nlp), Some(thesaurus.clone()));

        let attributes = pipeline.enrich(&item(), &site(Some("opennlp-en"), true)).await;

        let seen = thesaurus.seen.lock().await;
        assert!(seen[0].contains_key("person"));
        assert_eq!(attributes.get_string_list("subjects"), vec!["Finance"]);
    }

    #[tokio::test]
    async fn test_thesaurus_disabled_by_site() {
        let thesaurus = Arc::new(MockThesaurus::default());
        let pipeline = EnrichmentPipeline::new(None, Some(thesaurus.clone()));

        pipeline.enrich(&item(), &site(None, false)).await;

        assert!(thesaurus.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_thesaurus_failure_is_ignored() {
        let thesaurus = Arc::new(MockThesaurus {
            fail: true,
            ..Default::default()
        });
        let pipeline = EnrichmentPipeline::new(None, Some(thesaurus));

        let attributes = pipeline.enrich(&item(), &site(None, true)).await;

        assert!(!attributes.contains_key("subjects"));
        assert_eq!(attributes.get_str("id"), Some("1"));
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let attributes = Attributes::new()
            .with("tags", vec!["x", "y", "x", "z", "y"])
            .with("id", "1");

        let once = dedupe(attributes);
        let twice = dedupe(once.clone());

        assert_eq!(once, twice);
        assert_eq!(once.get_string_list("tags"), vec!["x", "y", "z"]);
    }
}
