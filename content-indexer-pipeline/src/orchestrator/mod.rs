//! Orchestrator module for the content indexer pipeline.
//!
//! Coordinates the Kafka consumer, the batch workers and queue control.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{KafkaJobConsumer, StreamMessage};
use crate::control::{QueueControlService, QueueState};
use crate::errors::PipelineError;
use crate::processor::{BackendSignal, JobQueueConsumer};

const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 100;
const DEFAULT_WORKER_COUNT: usize = 4;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the batch channel buffer.
    pub channel_buffer_size: usize,
    /// Number of batches processed concurrently.
    pub worker_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Runs the Kafka consumer in the background
/// - Hands each batch to a bounded pool of workers
/// - Suspends the consumer when a worker reports a backend outage
/// - Runs the periodic health check that resumes it
pub struct Orchestrator {
    consumer: Arc<KafkaJobConsumer>,
    processor: Arc<JobQueueConsumer>,
    control: Arc<QueueControlService>,
    signals: Option<mpsc::Receiver<BackendSignal>>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    ///
    /// `signals` is the receiving end of the channel `processor` reports
    /// backend outages on.
    pub fn new(
        consumer: Arc<KafkaJobConsumer>,
        processor: JobQueueConsumer,
        control: Arc<QueueControlService>,
        signals: mpsc::Receiver<BackendSignal>,
    ) -> Self {
        Self::with_config(consumer, processor, control, signals, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Arc<KafkaJobConsumer>,
        processor: JobQueueConsumer,
        control: Arc<QueueControlService>,
        signals: mpsc::Receiver<BackendSignal>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            processor: Arc::new(processor),
            control,
            signals: Some(signals),
            config,
            shutdown_tx,
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until Ctrl-C, [`Orchestrator::shutdown`] or the end of the
    /// consumer stream. Batches already handed to a worker finish first.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        info!(workers = self.config.worker_count, "Starting content indexer orchestrator");

        let signals = self
            .signals
            .take()
            .ok_or_else(|| PipelineError::consumer("Orchestrator is already running"))?;

        self.consumer.subscribe()?;

        let (tx, mut rx) = mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(tx, shutdown_rx).await {
                error!(error = %e, "Consumer error");
            }
        });

        let monitor_handle = self
            .control
            .clone()
            .spawn_health_monitor(self.shutdown_tx.subscribe());

        let listener_handle = spawn_signal_listener(
            self.control.clone(),
            self.consumer.consumer_id().to_string(),
            signals,
            self.shutdown_tx.subscribe(),
        );

        let workers = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let mut tasks = JoinSet::new();
        let mut shutdown = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(StreamMessage::Batch { batch, origin }) => {
                            // Offsets are committed on hand-over. A batch that
                            // arrives while suspended waits here for resume.
                            if !wait_until_dispatchable(&self.control, &mut shutdown).await {
                                warn!(
                                    partition = origin.partition,
                                    offset = origin.offset,
                                    "Shutdown while suspended, batch not dispatched"
                                );
                                break;
                            }
                            let permit = workers
                                .clone()
                                .acquire_owned()
                                .await
                                .map_err(|e| PipelineError::ChannelError(e.to_string()))?;
                            let processor = self.processor.clone();

                            tasks.spawn(async move {
                                let report = processor.receive(batch).await;
                                debug!(
                                    partition = origin.partition,
                                    offset = origin.offset,
                                    items = report.total(),
                                    "Worker finished batch"
                                );
                                drop(permit);
                            });
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                    }
                }
                // Reap finished workers so the set does not grow unbounded.
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Batch worker panicked");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Orchestrator shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        let _ = self.shutdown_tx.send(());

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Batch worker failed during shutdown");
            }
        }

        let _ = consumer_handle.await;
        let _ = monitor_handle.await;
        let _ = listener_handle.await;

        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Hold the next batch while the queue is SUSPENDED.
///
/// Returns `false` if shutdown was requested first.
async fn wait_until_dispatchable(
    control: &QueueControlService,
    shutdown: &mut broadcast::Receiver<()>,
) -> bool {
    if control.state().await == QueueState::Running {
        return true;
    }

    info!("Queue suspended, holding batch until the search backend recovers");
    tokio::select! {
        _ = control.wait_until_running() => {
            debug!("Queue running again, dispatching held batch");
            true
        }
        _ = shutdown.recv() => false,
        _ = tokio::signal::ctrl_c() => false,
    }
}

/// Suspend `consumer_id` for every backend outage reported on `signals`.
pub fn spawn_signal_listener(
    control: Arc<QueueControlService>,
    consumer_id: String,
    mut signals: mpsc::Receiver<BackendSignal>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                signal = signals.recv() => {
                    let Some(signal) = signal else {
                        break;
                    };
                    warn!(
                        site = %signal.site,
                        locale = %signal.locale,
                        reason = %signal.reason,
                        "Search backend unavailable"
                    );
                    if let Err(e) = control.suspend(&consumer_id).await {
                        error!(consumer = %consumer_id, error = %e, "Failed to suspend consumer");
                    }
                }
            }
        }
    })
}
