//! Dependency initialization and wiring for the content indexer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::Settings;
use crate::IndexingError;
use content_indexer_pipeline::{
    consumer::KafkaJobConsumer,
    enrichment::{NlpService, ThesaurusService},
    ConsumerControl, EnrichmentConfig, EnrichmentPipeline, HttpNlpService, HttpThesaurusService,
    JobQueueConsumer, Orchestrator, OrchestratorConfig, QueueControlConfig, QueueControlService,
    SpotlightCache,
};
use content_indexer_repository::{
    EngineBackendFactory, GatewayConfig, InMemoryStore, SearchBackendGateway,
};

/// Capacity of the backend outage signal channel.
const SIGNAL_BUFFER_SIZE: usize = 16;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    pub gateway: Arc<SearchBackendGateway>,
    pub control: Arc<QueueControlService>,
}

impl Dependencies {
    /// Build every component from `settings`.
    ///
    /// Search backend connections are opened lazily on first use, so an
    /// unreachable engine does not stop startup.
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            kafka_broker = %settings.kafka_broker,
            kafka_group_id = %settings.kafka_group_id,
            kafka_topic = %settings.kafka_topic,
            sites = %settings.sites_config_path.display(),
            "Initializing dependencies"
        );

        let store = Arc::new(InMemoryStore::from_json_file(&settings.sites_config_path)?);
        info!("Site configuration loaded");

        let gateway = Arc::new(SearchBackendGateway::with_config(
            Arc::new(EngineBackendFactory::new()),
            GatewayConfig::with_call_timeout(settings.backend_timeout),
        ));

        let enrichment = Arc::new(Self::enrichment(settings)?);
        let spotlights = Arc::new(SpotlightCache::new(store.clone()));

        let consumer = Arc::new(
            KafkaJobConsumer::new(&settings.kafka_broker, &settings.kafka_group_id, &settings.kafka_topic)
                .map_err(|e| IndexingError::config(format!("Failed to create Kafka consumer: {}", e)))?,
        );
        info!("Kafka consumer created");

        let control = Arc::new(QueueControlService::with_config(
            consumer.clone() as Arc<dyn ConsumerControl>,
            gateway.clone(),
            QueueControlConfig {
                health_check_interval: settings.health_check_interval,
            },
        ));

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER_SIZE);
        let processor = JobQueueConsumer::new(store, gateway.clone(), enrichment, spotlights)
            .with_signals(signal_tx);

        let orchestrator = Orchestrator::with_config(
            consumer,
            processor,
            control.clone(),
            signal_rx,
            OrchestratorConfig {
                worker_count: settings.worker_count,
                ..OrchestratorConfig::default()
            },
        );

        Ok(Self {
            orchestrator,
            gateway,
            control,
        })
    }

    fn enrichment(settings: &Settings) -> Result<EnrichmentPipeline, IndexingError> {
        let nlp = settings
            .nlp_url
            .as_deref()
            .map(HttpNlpService::new)
            .transpose()?
            .map(|service| Arc::new(service) as Arc<dyn NlpService>);
        let thesaurus = settings
            .thesaurus_url
            .as_deref()
            .map(HttpThesaurusService::new)
            .transpose()?
            .map(|service| Arc::new(service) as Arc<dyn ThesaurusService>);

        info!(
            nlp = nlp.is_some(),
            thesaurus = thesaurus.is_some(),
            "Enrichment services configured"
        );

        Ok(EnrichmentPipeline::with_config(
            nlp,
            thesaurus,
            EnrichmentConfig {
                call_timeout: settings.collaborator_timeout,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn settings(sites_path: &str) -> Settings {
        let vars: HashMap<&str, String> = [
            ("SITES_CONFIG_PATH", sites_path.to_string()),
            ("NLP_URL", "http://localhost:8081".to_string()),
        ]
        .into_iter()
        .collect();
        Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_enrichment_from_settings() {
        let settings = settings("sites.json");
        assert!(Dependencies::enrichment(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_missing_sites_file_fails() {
        let result = Dependencies::new(&settings("/nonexistent/sites.json")).await;
        assert!(matches!(result, Err(IndexingError::StoreError(_))));
    }

    #[tokio::test]
    async fn test_wires_components() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sites": [{{"name": "site1", "engine": {{"kind": "opensearch", "url": "http://localhost:9200"}}, "locales": [{{"language": "en_US"}}]}}], "spotlights": []}}"#
        )
        .unwrap();

        let dependencies = Dependencies::new(&settings(file.path().to_str().unwrap()))
            .await
            .unwrap();

        assert_eq!(dependencies.gateway.instance_count().await, 0);
        assert_eq!(
            dependencies.control.state().await,
            content_indexer_pipeline::QueueState::Running
        );
    }
}
