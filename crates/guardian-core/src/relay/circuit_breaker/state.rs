//! Per-operation circuit state and metrics snapshot.

use guardian_types::{CircuitConfig, CircuitState};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::window::{MetricsWindow, WindowCounts};

/// Lifetime counters for one operation key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeCounters {
    pub total_requests: u64,
    pub failures: u64,
    pub slow_calls: u64,
    pub rejected_calls: u64,
    pub transitions: u64,
}

/// Per-operation circuit breaker state
#[derive(Debug)]
pub(crate) struct OperationCircuit {
    pub config: CircuitConfig,
    pub state: CircuitState,
    pub opened_at: Option<Instant>,
    pub consecutive_failures: u32,
    pub trial_in_flight: bool,
    /// Bumped on every state change; stale trial permits compare against it
    pub epoch: u64,
    pub window: MetricsWindow,
    pub lifetime: LifetimeCounters,
    pub last_failure_reason: Option<String>,
}

impl OperationCircuit {
    pub fn new(config: CircuitConfig, window: Duration) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            opened_at: None,
            consecutive_failures: 0,
            trial_in_flight: false,
            epoch: 0,
            window: MetricsWindow::new(window),
            lifetime: LifetimeCounters::default(),
            last_failure_reason: None,
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.config.reset_timeout_ms)
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.config.slow_call_duration_threshold_ms)
    }

    /// Time left before an OPEN circuit admits a trial.
    pub fn remaining_open(&self, now: Instant) -> Duration {
        self.opened_at.map_or(Duration::ZERO, |opened| {
            self.reset_timeout().saturating_sub(now.duration_since(opened))
        })
    }

    pub fn open(&mut self, now: Instant) {
        self.epoch += 1;
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }

    pub fn half_open(&mut self) {
        self.epoch += 1;
        self.state = CircuitState::HalfOpen;
        self.trial_in_flight = false;
    }

    pub fn close(&mut self) {
        self.epoch += 1;
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.trial_in_flight = false;
        self.consecutive_failures = 0;
        self.last_failure_reason = None;
        self.window.clear();
    }

    /// Reason string when the closed-state policy says trip, `None` otherwise.
    pub fn trip_reason(&mut self, now: Instant) -> Option<String> {
        if self.consecutive_failures >= self.config.failure_threshold {
            return Some(format!("{} consecutive failures", self.consecutive_failures));
        }

        let counts = self.window.counts(now);
        if counts.total_requests < self.config.request_volume_threshold {
            return None;
        }
        let failure_rate = counts.failure_rate();
        if failure_rate >= self.config.error_percentage_threshold {
            return Some(format!(
                "failure rate {failure_rate:.1}% over {} requests (threshold {}%)",
                counts.total_requests, self.config.error_percentage_threshold
            ));
        }
        let slow_rate = counts.slow_call_rate();
        if slow_rate >= self.config.slow_call_percentage_threshold {
            return Some(format!(
                "slow call rate {slow_rate:.1}% over {} requests (threshold {}%)",
                counts.total_requests, self.config.slow_call_percentage_threshold
            ));
        }
        None
    }

    pub fn snapshot(&mut self, operation: &str, now: Instant) -> CircuitMetricsSnapshot {
        let window = self.window.counts(now);
        CircuitMetricsSnapshot {
            operation: operation.to_string(),
            state: self.state,
            lifetime: self.lifetime,
            window,
            failure_rate: window.failure_rate(),
            slow_call_rate: window.slow_call_rate(),
            consecutive_failures: self.consecutive_failures,
            trial_in_flight: self.trial_in_flight,
            last_failure_reason: self.last_failure_reason.clone(),
            retry_after_ms: match self.state {
                CircuitState::Open => Some(self.remaining_open(now).as_millis() as u64),
                CircuitState::Closed | CircuitState::HalfOpen => None,
            },
        }
    }
}

/// Point-in-time view of one breaker, returned by `get_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitMetricsSnapshot {
    pub operation: String,
    pub state: CircuitState,
    pub lifetime: LifetimeCounters,
    pub window: WindowCounts,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
    pub consecutive_failures: u32,
    pub trial_in_flight: bool,
    pub last_failure_reason: Option<String>,
    /// Time until a trial is admitted, only while OPEN
    pub retry_after_ms: Option<u64>,
}
