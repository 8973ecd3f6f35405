//! Application State
//!
//! Shared handles for the relay: breaker registry, pooled worker client,
//! health probe and the transition fan-out used by WebSocket sessions.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use guardian_core::relay::{BroadcastListener, WorkerHealthProbe};
use guardian_core::{CircuitBreakerRegistry, SpeechWorker, WorkerClient};
use guardian_types::GuardianConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: GuardianConfig,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub worker: Arc<WorkerClient>,
    pub health_probe: Arc<WorkerHealthProbe>,
    pub transitions: BroadcastListener,
    pub active_sessions: AtomicUsize,
    pub started_at: Instant,
}

impl AppState {
    /// Build every shared component from a validated config.
    pub fn new(config: GuardianConfig) -> Result<Self> {
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker.clone()));
        let worker =
            Arc::new(WorkerClient::from_config(&config).context("failed to build AI worker client")?);

        let transitions = BroadcastListener::new(config.relay.event_channel_capacity);
        breakers.subscribe(Arc::new(transitions.clone()));

        let health_probe = WorkerHealthProbe::new(
            Arc::clone(&breakers),
            Arc::clone(&worker) as Arc<dyn SpeechWorker>,
            Duration::from_millis(config.relay.health_check_interval_ms),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                breakers,
                worker,
                health_probe,
                transitions,
                active_sessions: AtomicUsize::new(0),
                started_at: Instant::now(),
            }),
        })
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.inner.config
    }

    pub fn breakers(&self) -> Arc<CircuitBreakerRegistry> {
        Arc::clone(&self.inner.breakers)
    }

    pub fn worker(&self) -> &WorkerClient {
        &self.inner.worker
    }

    pub fn speech_worker(&self) -> Arc<dyn SpeechWorker> {
        Arc::clone(&self.inner.worker) as Arc<dyn SpeechWorker>
    }

    pub fn health_probe(&self) -> &Arc<WorkerHealthProbe> {
        &self.inner.health_probe
    }

    pub fn transitions(&self) -> &BroadcastListener {
        &self.inner.transitions
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.active_sessions.load(Ordering::Relaxed)
    }

    /// Count a connected session until the returned guard drops.
    pub fn track_session(&self) -> SessionGuard {
        self.inner.active_sessions.fetch_add(1, Ordering::Relaxed);
        SessionGuard { state: self.clone() }
    }
}

pub struct SessionGuard {
    state: AppState,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.inner.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
