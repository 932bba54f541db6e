//! # Content Indexer Pipeline
//!
//! This crate provides the pipeline components for consuming indexing jobs
//! from Kafka and applying them to the configured search backends.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives job batches from Kafka
//! 2. **Processor**: Runs the CREATE/DELETE/COMMIT state machine per item
//! 3. **Enrichment** and **Merge**: Build the document a CREATE indexes
//! 4. **Spotlight**: Keeps externally managed spotlights in sync
//! 5. **Control**: Suspends the consumer while the backend is down
//! 6. **Orchestrator**: Coordinates the pipeline flow

pub mod consumer;
pub mod control;
pub mod enrichment;
pub mod errors;
pub mod merge;
pub mod orchestrator;
pub mod processor;
pub mod spotlight;

pub use control::{ConsumerControl, HealthProbe, QueueControlConfig, QueueControlService, QueueState};
pub use enrichment::{EnrichmentConfig, EnrichmentPipeline, HttpNlpService, HttpThesaurusService};
pub use errors::PipelineError;
pub use merge::MergeProviderProcess;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use processor::{BackendSignal, BatchReport, JobQueueConsumer};
pub use spotlight::SpotlightCache;
