//! # Content Indexer
//!
//! Main library for the content indexer.
//!
//! This crate provides the entry point and configuration for running
//! the content indexing pipeline.

pub mod config;
pub mod logging;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] content_indexer_pipeline::PipelineError),

    /// Site or spotlight store error.
    #[error("Store error: {0}")]
    StoreError(#[from] content_indexer_repository::StoreError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
