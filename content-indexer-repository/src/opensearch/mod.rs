//! OpenSearch implementation of the search backend.
//!
//! This module provides [`OpenSearchBackend`], a `SearchBackend` driver for
//! one OpenSearch index, using the official OpenSearch Rust client.

mod client;
mod index_config;
mod queries;

pub use client::OpenSearchBackend;
pub use index_config::IndexConfig;
