//! Circuit breaker state and transition events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation keys guarded by independent breakers.
pub mod operations {
    /// Audio chunk forwarding to `/asr/stream`
    pub const FORWARD_AUDIO: &str = "forwardAudio";
    /// Transcript classification via `/moderation`
    pub const PROCESS_MODERATION: &str = "processModeration";
    /// Periodic worker liveness probe
    pub const HEALTH_CHECK: &str = "healthCheck";

    pub const ALL: [&str; 3] = [FORWARD_AUDIO, PROCESS_MODERATION, HEALTH_CHECK];
}

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Downstream is failing - calls are rejected immediately
    Open,
    /// Testing recovery - a single trial call is admitted
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding for the `circuit_breaker_state` gauge.
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitEventKind {
    StateChange,
}

/// A recorded breaker transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitEvent {
    #[serde(rename = "type")]
    pub kind: CircuitEventKind,
    pub operation: String,
    pub previous_state: CircuitState,
    pub new_state: CircuitState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl CircuitEvent {
    pub fn state_change(
        operation: &str,
        previous_state: CircuitState,
        new_state: CircuitState,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: CircuitEventKind::StateChange,
            operation: operation.to_string(),
            previous_state,
            new_state,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}
