//! Background liveness probe for the AI worker.
//!
//! Calls `healthCheck` through its breaker on a fixed interval and keeps the
//! last outcome for readiness reporting.

use chrono::{DateTime, Utc};
use guardian_types::{operations, RelayError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreakerRegistry;
use super::worker::SpeechWorker;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStatus {
    /// `None` until the first probe completes
    pub healthy: Option<bool>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

pub struct WorkerHealthProbe {
    breakers: Arc<CircuitBreakerRegistry>,
    worker: Arc<dyn SpeechWorker>,
    interval: Duration,
    status: RwLock<ProbeStatus>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerHealthProbe {
    pub fn new(
        breakers: Arc<CircuitBreakerRegistry>,
        worker: Arc<dyn SpeechWorker>,
        interval: Duration,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            breakers,
            worker,
            interval,
            status: RwLock::new(ProbeStatus::default()),
            shutdown_tx,
        })
    }

    pub fn status(&self) -> ProbeStatus {
        self.status.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.status.read().healthy == Some(true)
    }

    pub async fn probe_once(&self) -> Result<(), RelayError> {
        let worker = Arc::clone(&self.worker);
        let result = self
            .breakers
            .execute_call(operations::HEALTH_CHECK, move || async move {
                worker.health_check().await
            })
            .await;

        let mut status = self.status.write();
        let was_healthy = status.healthy;
        status.last_checked = Some(Utc::now());
        match &result {
            Ok(()) => {
                status.healthy = Some(true);
                status.last_error = None;
                status.consecutive_failures = 0;
                if was_healthy != Some(true) {
                    info!("AI worker is healthy");
                }
            },
            Err(err) => {
                status.healthy = Some(false);
                status.last_error = Some(err.to_string());
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                warn!(
                    error = %err,
                    consecutive_failures = status.consecutive_failures,
                    "AI worker health check failed"
                );
            },
        }
        result
    }

    /// Start the background probe loop. The first probe runs immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let probe = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = probe.probe_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Worker health probe shutting down");
                        break;
                    }
                }
            }
            debug!("Worker health probe stopped");
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use guardian_types::{AsrResponse, ModerationResponse};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use crate::relay::worker::ForwardRequest;

    #[derive(Default)]
    struct FlakyWorker {
        down: AtomicBool,
        probes: AtomicU32,
    }

    #[async_trait]
    impl SpeechWorker for FlakyWorker {
        async fn forward(&self, _: ForwardRequest) -> Result<AsrResponse, RelayError> {
            Err(RelayError::Network { message: "unused".into() })
        }

        async fn moderate(&self, _: Vec<String>) -> Result<ModerationResponse, RelayError> {
            Err(RelayError::Network { message: "unused".into() })
        }

        async fn health_check(&self) -> Result<(), RelayError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                Err(RelayError::UpstreamStatus { code: 503, body: String::new() })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_probe_tracks_last_outcome() {
        let worker = Arc::new(FlakyWorker::default());
        let probe = WorkerHealthProbe::new(
            Arc::new(CircuitBreakerRegistry::default()),
            Arc::clone(&worker) as Arc<dyn SpeechWorker>,
            Duration::from_secs(15),
        );
        assert!(!probe.is_ready());

        probe.probe_once().await.unwrap();
        assert!(probe.is_ready());

        worker.down.store(true, Ordering::SeqCst);
        probe.probe_once().await.unwrap_err();
        probe.probe_once().await.unwrap_err();
        let status = probe.status();
        assert_eq!(status.healthy, Some(false));
        assert_eq!(status.consecutive_failures, 2);
        assert!(status.last_error.unwrap().contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_probes_on_interval_until_shutdown() {
        let worker = Arc::new(FlakyWorker::default());
        let probe = WorkerHealthProbe::new(
            Arc::new(CircuitBreakerRegistry::default()),
            Arc::clone(&worker) as Arc<dyn SpeechWorker>,
            Duration::from_secs(15),
        );

        let handle = probe.start();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(worker.probes.load(Ordering::SeqCst), 3);

        probe.shutdown();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(worker.probes.load(Ordering::SeqCst), 3);
    }
}
