//! Consumer module for the content indexer pipeline.
//!
//! Provides the Kafka transport that delivers job batches.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::KafkaJobConsumer;
pub use messages::{decode_batch, BatchOrigin, StreamMessage};
