//! Kafka consumer implementation for the content indexer.
//!
//! Consumes job batches from Kafka topics and forwards them to the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{decode_batch, BatchOrigin, StreamMessage};
use crate::control::ConsumerControl;
use crate::errors::PipelineError;

/// Kafka consumer for job batches.
///
/// Its consumer id is the consumer group id. Stopping it through
/// [`ConsumerControl`] pauses the current partition assignment, so the
/// consumer keeps its group membership while suspended.
pub struct KafkaJobConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
    consumer_id: String,
    paused: AtomicBool,
}

impl KafkaJobConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID, also used as the consumer id
    /// * `topic` - Topic carrying job batches
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| PipelineError::kafka(e.to_string()))?;

        info!(brokers = %brokers, group_id = %group_id, "Created Kafka consumer");

        Ok(Self {
            consumer,
            topics: vec![topic.to_string()],
            consumer_id: group_id.to_string(),
            paused: AtomicBool::new(false),
        })
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Subscribe to configured topics.
    pub fn subscribe(&self) -> Result<(), PipelineError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    /// Start consuming messages and send them through the channel.
    ///
    /// # Arguments
    ///
    /// * `sender` - Channel to send batches to
    /// * `shutdown` - Shutdown signal receiver
    #[instrument(skip(self, sender, shutdown))]
    pub async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            if let Err(e) = self.process_message(&msg, &sender).await {
                                error!(error = %e, "Failed to process message");
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Decode one message, hand the batch over and commit its offset.
    ///
    /// Undecodable payloads are logged and committed so they are not
    /// redelivered forever.
    async fn process_message(
        &self,
        msg: &BorrowedMessage<'_>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), PipelineError> {
        let origin = BatchOrigin {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
        };

        match msg.payload() {
            None => debug!("Received message with empty payload"),
            Some(payload) => match decode_batch(payload) {
                Ok(batch) if batch.is_empty() => debug!("Received empty batch"),
                Ok(batch) => {
                    debug!(
                        topic = %origin.topic,
                        partition = origin.partition,
                        offset = origin.offset,
                        items = batch.len(),
                        "Received job batch"
                    );
                    sender
                        .send(StreamMessage::Batch {
                            batch,
                            origin: origin.clone(),
                        })
                        .await
                        .map_err(|e| PipelineError::ChannelError(e.to_string()))?;
                }
                Err(e) => {
                    warn!(offset = origin.offset, error = %e, "Skipping undecodable message");
                }
            },
        }

        self.commit_offset(&origin)
    }

    fn commit_offset(&self, origin: &BatchOrigin) -> Result<(), PipelineError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&origin.topic, origin.partition, Offset::Offset(origin.offset + 1))?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    fn check_id(&self, consumer_id: &str) -> Result<(), PipelineError> {
        if consumer_id == self.consumer_id {
            Ok(())
        } else {
            Err(PipelineError::consumer(format!("Unknown consumer: {}", consumer_id)))
        }
    }
}

#[async_trait]
impl ConsumerControl for KafkaJobConsumer {
    async fn is_running(&self, consumer_id: &str) -> bool {
        consumer_id == self.consumer_id && !self.paused.load(Ordering::SeqCst)
    }

    async fn start(&self, consumer_id: &str) -> Result<(), PipelineError> {
        self.check_id(consumer_id)?;
        let assignment = self.consumer.assignment()?;
        self.consumer.resume(&assignment)?;
        self.paused.store(false, Ordering::SeqCst);

        info!(consumer = %consumer_id, partitions = assignment.count(), "Resumed Kafka consumption");
        Ok(())
    }

    async fn stop(&self, consumer_id: &str) -> Result<(), PipelineError> {
        self.check_id(consumer_id)?;
        let assignment = self.consumer.assignment()?;
        self.consumer.pause(&assignment)?;
        self.paused.store(true, Ordering::SeqCst);

        info!(consumer = %consumer_id, partitions = assignment.count(), "Paused Kafka consumption");
        Ok(())
    }
}
