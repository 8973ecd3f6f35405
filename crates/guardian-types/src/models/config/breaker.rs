//! Circuit breaker thresholds.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::circuit::operations;

/// Thresholds for one operation key. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit regardless of volume
    #[validate(range(min = 1_u32))]
    pub failure_threshold: u32,
    /// Time spent OPEN before a trial call is admitted
    #[validate(range(min = 1_u64))]
    pub reset_timeout_ms: u64,
    /// Minimum calls in the window before rates are considered
    #[validate(range(min = 1_u32))]
    pub request_volume_threshold: u32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub error_percentage_threshold: f64,
    /// A call at or above this duration counts as slow, even on success
    #[validate(range(min = 1_u64))]
    pub slow_call_duration_threshold_ms: u64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub slow_call_percentage_threshold: f64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self::forward_audio()
    }
}

impl CircuitConfig {
    /// Audio forwarding: fail fast, the client is waiting on a live stream.
    pub const fn forward_audio() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            request_volume_threshold: 10,
            error_percentage_threshold: 50.0,
            slow_call_duration_threshold_ms: 2_000,
            slow_call_percentage_threshold: 80.0,
        }
    }

    pub const fn moderation() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            request_volume_threshold: 10,
            error_percentage_threshold: 50.0,
            slow_call_duration_threshold_ms: 3_000,
            slow_call_percentage_threshold: 80.0,
        }
    }

    /// Health probing is low-volume and tolerant of a sluggish worker.
    pub const fn health_check() -> Self {
        Self {
            failure_threshold: 10,
            reset_timeout_ms: 60_000,
            request_volume_threshold: 20,
            error_percentage_threshold: 80.0,
            slow_call_duration_threshold_ms: 5_000,
            slow_call_percentage_threshold: 100.0,
        }
    }
}

/// Registry-wide breaker settings plus the per-operation sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSettings {
    /// When false, `execute_call` never rejects
    pub enable_circuit_breaker: bool,
    #[validate(range(min = 1_usize))]
    pub max_events_in_history: usize,
    #[validate(range(min = 100_u64))]
    pub metrics_window_size_ms: u64,
    #[validate(nested)]
    pub forward_audio: CircuitConfig,
    #[validate(nested)]
    pub moderation: CircuitConfig,
    #[validate(nested)]
    pub health_check: CircuitConfig,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            enable_circuit_breaker: true,
            max_events_in_history: 1000,
            metrics_window_size_ms: 60_000,
            forward_audio: CircuitConfig::forward_audio(),
            moderation: CircuitConfig::moderation(),
            health_check: CircuitConfig::health_check(),
        }
    }
}

impl BreakerSettings {
    /// Thresholds for an operation key. Unknown keys share the audio set.
    pub fn config_for(&self, operation: &str) -> &CircuitConfig {
        match operation {
            operations::PROCESS_MODERATION => &self.moderation,
            operations::HEALTH_CHECK => &self.health_check,
            _ => &self.forward_audio,
        }
    }
}
