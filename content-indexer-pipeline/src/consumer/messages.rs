//! Message types for the consumer.
//!
//! Defines what the transport hands to the orchestrator and how a Kafka
//! payload is decoded into a [`JobBatch`].

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::PipelineError;
use content_indexer_shared::{JobBatch, JobItem};

/// Where a batch came from, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOrigin {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Messages that flow from the consumer to the orchestrator.
#[derive(Debug)]
pub enum StreamMessage {
    /// A decoded batch of job items.
    Batch { batch: JobBatch, origin: BatchOrigin },
    /// A transport error. Consumption continues.
    Error(String),
    /// The stream has ended.
    End,
}

/// Accepted payload shapes: a bare array of items, or `{"items": [...]}`.
///
/// Items stay raw JSON here so one malformed item cannot sink the batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Items(Vec<Value>),
    Wrapped { items: Vec<Value> },
}

/// Decode a message payload into a batch.
///
/// Fails only when the payload is not a batch at all. Items that do not
/// decode are logged and left out.
pub fn decode_batch(payload: &[u8]) -> Result<JobBatch, PipelineError> {
    let decoded: Payload = serde_json::from_slice(payload)
        .map_err(|e| PipelineError::parse(format!("Failed to decode job batch: {}", e)))?;

    let raw = match decoded {
        Payload::Items(items) | Payload::Wrapped { items } => items,
    };

    let mut items = Vec::with_capacity(raw.len());
    for (position, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<JobItem>(value) {
            Ok(item) => items.push(item),
            Err(e) => warn!(position = position, error = %e, "Skipping undecodable job item"),
        }
    }
    Ok(JobBatch::new(items))
}
