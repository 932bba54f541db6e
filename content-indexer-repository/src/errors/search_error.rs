//! Search error types.
//!
//! This module defines the error types that can occur during search backend operations.

use thiserror::Error;

/// Errors that can occur during search backend operations.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// Failed to reach the search backend, or it answered as unavailable.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A backend call did not finish in time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Search query execution failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to commit pending changes.
    #[error("Commit error: {0}")]
    CommitError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse response from search backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The document cannot be sent to the backend as is.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a commit error.
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::CommitError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an invalid document error.
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Whether the failure means the backend itself is unreachable or down,
    /// as opposed to a problem with one request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout { .. })
    }

    /// Map a non-success HTTP status. Gateway errors and 503 mean the
    /// backend is down; anything else is charged to the request via `other`.
    pub fn from_status(status: u16, body: &str, other: fn(String) -> Self) -> Self {
        let msg = format!("status {}: {}", status, body);
        match status {
            502..=504 => Self::ConnectionError(msg),
            _ => other(msg),
        }
    }
}
