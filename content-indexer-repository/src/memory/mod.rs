//! In-process search backend.
//!
//! Holds documents in memory and records every mutating call, which makes it
//! the backend of choice for tests and local runs without an engine. Writes
//! are visible to searches immediately; `commit` is only recorded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::interfaces::{BackendFactory, SearchBackend};
use crate::query::{BackendQuery, BackendResponse};
use content_indexer_shared::{
    Attributes, SearchHit, Site, SiteLocale, SortDirection, TYPE_ATTRIBUTE,
};

/// A mutating call observed by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOperation {
    Index(String),
    DeleteById(String),
    DeleteByType(String),
    Commit,
}

pub struct InMemoryBackend {
    name: String,
    documents: RwLock<BTreeMap<String, Attributes>>,
    operations: Mutex<Vec<BackendOperation>>,
    available: AtomicBool,
    latency: Mutex<Duration>,
}

impl InMemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            operations: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Make every call fail with a connection error while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub fn operations(&self) -> Vec<BackendOperation> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn document(&self, id: &str) -> Option<Attributes> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn enter(&self) -> Result<(), SearchError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchError::connection(format!("{} is unavailable", self.name)))
        }
    }

    fn record(&self, operation: BackendOperation) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }
}

fn matches(document: &Attributes, query: &BackendQuery) -> bool {
    let filters_match = query.filters.iter().all(|(field, value)| {
        document
            .get(field)
            .map(|v| v.to_string_list().iter().any(|s| s == value))
            .unwrap_or(false)
    });

    let terms_match = query.terms.iter().all(|term| {
        let term = term.to_lowercase();
        document
            .iter()
            .any(|(_, value)| value.to_text().to_lowercase().contains(&term))
    });

    filters_match && terms_match
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index_document(&self, id: &str, document: &Attributes) -> Result<(), SearchError> {
        self.enter().await?;
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), document.clone());
        self.record(BackendOperation::Index(id.to_string()));
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), SearchError> {
        self.enter().await?;
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.record(BackendOperation::DeleteById(id.to_string()));
        Ok(())
    }

    async fn delete_by_type(&self, doc_type: &str) -> Result<(), SearchError> {
        self.enter().await?;
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, doc| doc.get_text(TYPE_ATTRIBUTE).as_deref() != Some(doc_type));
        self.record(BackendOperation::DeleteByType(doc_type.to_string()));
        Ok(())
    }

    async fn commit(&self) -> Result<(), SearchError> {
        self.enter().await?;
        self.record(BackendOperation::Commit);
        Ok(())
    }

    async fn search(&self, query: &BackendQuery) -> Result<BackendResponse, SearchError> {
        self.enter().await?;
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);

        let mut found: Vec<&Attributes> = documents
            .values()
            .filter(|doc| matches(doc, query))
            .collect();

        if let Some(sort) = &query.sort {
            found.sort_by_key(|doc| doc.get_text(&sort.field));
            if sort.direction == SortDirection::Desc {
                found.reverse();
            }
        }

        let num_found = found.len() as u64;
        let hits = found
            .into_iter()
            .skip(query.start as usize)
            .take(query.rows as usize)
            .map(|doc| SearchHit {
                id: doc.document_id(),
                score: Some(1.0),
                fields: doc.clone(),
            })
            .collect();

        Ok(BackendResponse {
            num_found,
            q_time: 0,
            hits,
        })
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        self.enter().await?;
        Ok(true)
    }
}

/// Factory giving each core its own [`InMemoryBackend`], created on first use.
#[derive(Default)]
pub struct InMemoryBackendFactory {
    backends: Mutex<BTreeMap<String, Arc<InMemoryBackend>>>,
}

impl InMemoryBackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend serving `core`, if it was ever connected.
    pub fn backend(&self, core: &str) -> Option<Arc<InMemoryBackend>> {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(core)
            .cloned()
    }

    fn backend_or_create(&self, core: &str) -> Arc<InMemoryBackend> {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(core.to_string())
            .or_insert_with(|| Arc::new(InMemoryBackend::new(core)))
            .clone()
    }
}

#[async_trait]
impl BackendFactory for InMemoryBackendFactory {
    async fn connect(
        &self,
        _site: &Site,
        _locale: &SiteLocale,
        core: &str,
    ) -> Result<Arc<dyn SearchBackend>, SearchError> {
        Ok(self.backend_or_create(core))
    }
}
