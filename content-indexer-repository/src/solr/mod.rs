//! Solr implementation of the search backend.
//!
//! [`SolrBackend`] talks to one Solr core over its JSON HTTP API.

mod client;
mod queries;

pub use client::SolrBackend;
