//! Processor module for the content indexer pipeline.
//!
//! Turns job batches into search backend and spotlight store calls.

mod job_processor;

pub use job_processor::{BackendSignal, BatchReport, JobQueueConsumer};
