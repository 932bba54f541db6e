//! Queue backpressure control.
//!
//! When the search backend goes down the queue consumer is stopped instead
//! of failing every item against it. A periodic health check restarts it once
//! the backend is reachable again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::errors::PipelineError;
use content_indexer_repository::SearchBackendGateway;

const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the queue control service.
#[derive(Debug, Clone)]
pub struct QueueControlConfig {
    /// Time between health checks.
    pub health_check_interval: Duration,
}

impl Default for QueueControlConfig {
    fn default() -> Self {
        Self {
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Running,
    Suspended,
}

/// Start/stop handle over the queue consumers.
#[async_trait]
pub trait ConsumerControl: Send + Sync {
    async fn is_running(&self, consumer_id: &str) -> bool;

    async fn start(&self, consumer_id: &str) -> Result<(), PipelineError>;

    async fn stop(&self, consumer_id: &str) -> Result<(), PipelineError>;
}

/// Reports whether the search backend can take traffic.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_available(&self) -> bool;
}

#[async_trait]
impl HealthProbe for SearchBackendGateway {
    async fn is_available(&self) -> bool {
        self.check_health().await
    }
}

struct ControlState {
    state: QueueState,
    backend_available: bool,
    suspended: BTreeSet<String>,
}

/// RUNNING/SUSPENDED state machine over the queue consumers.
///
/// All transitions happen under one async mutex, so a manual suspend and the
/// periodic auto-resume never interleave.
pub struct QueueControlService {
    consumers: Arc<dyn ConsumerControl>,
    probe: Arc<dyn HealthProbe>,
    config: QueueControlConfig,
    state: Mutex<ControlState>,
    /// Mirrors `state.state` for callers waiting on a transition.
    state_tx: watch::Sender<QueueState>,
}

impl QueueControlService {
    pub fn new(consumers: Arc<dyn ConsumerControl>, probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_config(consumers, probe, QueueControlConfig::default())
    }

    pub fn with_config(
        consumers: Arc<dyn ConsumerControl>,
        probe: Arc<dyn HealthProbe>,
        config: QueueControlConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(QueueState::Running);

        Self {
            consumers,
            probe,
            config,
            state_tx,
            state: Mutex::new(ControlState {
                state: QueueState::Running,
                backend_available: true,
                suspended: BTreeSet::new(),
            }),
        }
    }

    pub async fn state(&self) -> QueueState {
        self.state.lock().await.state
    }

    pub async fn backend_available(&self) -> bool {
        self.state.lock().await.backend_available
    }

    /// Wait until the queue is RUNNING. Returns at once if it already is.
    pub async fn wait_until_running(&self) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state_rx.wait_for(|state| *state == QueueState::Running).await;
    }

    /// Stop `consumer_id` if it is running and enter SUSPENDED.
    pub async fn suspend(&self, consumer_id: &str) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        state.backend_available = false;

        if !self.consumers.is_running(consumer_id).await {
            debug!(consumer = %consumer_id, "Consumer already stopped");
            return Ok(());
        }

        self.consumers.stop(consumer_id).await?;
        state.suspended.insert(consumer_id.to_string());
        state.state = QueueState::Suspended;
        self.state_tx.send_replace(QueueState::Suspended);

        warn!(consumer = %consumer_id, "Queue consumer suspended until the search backend recovers");
        Ok(())
    }

    /// Start `consumer_id` if it is not running.
    pub async fn resume(&self, consumer_id: &str) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        self.resume_locked(&mut state, consumer_id).await
    }

    async fn resume_locked(&self, state: &mut ControlState, consumer_id: &str) -> Result<(), PipelineError> {
        if !self.consumers.is_running(consumer_id).await {
            self.consumers.start(consumer_id).await?;
            info!(consumer = %consumer_id, "Queue consumer resumed");
        }

        state.suspended.remove(consumer_id);
        if state.suspended.is_empty() {
            state.state = QueueState::Running;
            self.state_tx.send_replace(QueueState::Running);
        }
        Ok(())
    }

    /// One health check round. While SUSPENDED, probe the backend and resume
    /// every suspended consumer once it is available.
    pub async fn check_health(&self) -> QueueState {
        let mut state = self.state.lock().await;
        if state.state != QueueState::Suspended {
            return state.state;
        }

        if !self.probe.is_available().await {
            debug!("Search backend still unavailable, staying suspended");
            return state.state;
        }

        info!("Search backend available again");
        state.backend_available = true;

        let suspended: Vec<String> = state.suspended.iter().cloned().collect();
        for consumer_id in suspended {
            if let Err(e) = self.resume_locked(&mut state, &consumer_id).await {
                error!(consumer = %consumer_id, error = %e, "Failed to resume consumer");
            }
        }
        state.state
    }

    /// Run [`QueueControlService::check_health`] every
    /// `health_check_interval` until `shutdown` fires.
    pub fn spawn_health_monitor(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.health_check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!("Health monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.check_health().await;
                    }
                }
            }
        })
    }
}
