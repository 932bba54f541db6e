//! Persistence error types.

use thiserror::Error;

/// Errors raised by the site and spotlight stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the backing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store rejected the operation.
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
