//! # Content Indexer Repository
//!
//! Search backend access for the content indexer: the gateway that caches
//! backend instances per (site, locale, core), the OpenSearch and Solr
//! drivers behind it, engine-neutral query translation, and the stores for
//! site configuration and spotlight entries.

pub mod config;
pub mod errors;
pub mod factory;
pub mod gateway;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod query;
pub mod solr;
pub mod store;

pub use config::GatewayConfig;
pub use errors::{SearchError, StoreError};
pub use factory::EngineBackendFactory;
pub use gateway::{BackendInstance, InstanceKey, SearchBackendGateway};
pub use interfaces::{BackendFactory, SearchBackend, SiteStore, SpotlightStore};
pub use memory::{BackendOperation, InMemoryBackend, InMemoryBackendFactory};
pub use query::{BackendQuery, BackendResponse};
pub use store::InMemoryStore;
