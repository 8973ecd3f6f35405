//! Startup configuration.
//!
//! Defaults come from `Default`, `GUARDIAN_*` environment variables override
//! individual fields, and the result is validated once before the server binds.

mod breaker;
mod buffer;
mod env;
mod server;
mod worker;

pub use breaker::{BreakerSettings, CircuitConfig};
pub use buffer::BufferConfig;
pub use env::ENV_PREFIX;
pub use server::{RelayConfig, ServerConfig};
pub use worker::{BackoffConfig, WorkerConfig};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;
use env::EnvOverrides;

/// Full daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GuardianConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub worker: WorkerConfig,
    #[validate(nested)]
    pub backoff: BackoffConfig,
    #[validate(nested)]
    pub breaker: BreakerSettings,
    #[validate(nested)]
    pub buffer: BufferConfig,
    #[validate(nested)]
    pub relay: RelayConfig,
}

impl GuardianConfig {
    /// Defaults overlaid with the process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        EnvOverrides::new(lookup).apply(&mut config)?;
        config.check()?;
        Ok(config)
    }

    /// Field-level validation plus cross-field invariants.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;

        let b = &self.buffer;
        if b.min_buffer_bytes > b.max_buffer_bytes {
            return Err(ConfigError::invalid(
                "buffer.min_buffer_bytes",
                format!("{} exceeds max_buffer_bytes {}", b.min_buffer_bytes, b.max_buffer_bytes),
            ));
        }
        if !(b.min_buffer_bytes..=b.max_buffer_bytes).contains(&b.initial_buffer_bytes) {
            return Err(ConfigError::invalid(
                "buffer.initial_buffer_bytes",
                format!(
                    "{} outside [{}, {}]",
                    b.initial_buffer_bytes, b.min_buffer_bytes, b.max_buffer_bytes
                ),
            ));
        }
        if b.min_chunk_bytes > b.min_buffer_bytes {
            return Err(ConfigError::invalid(
                "buffer.min_chunk_bytes",
                "must not exceed min_buffer_bytes",
            ));
        }
        if b.low_latency_ms >= b.high_latency_ms {
            return Err(ConfigError::invalid(
                "buffer.low_latency_ms",
                "must be below high_latency_ms",
            ));
        }
        if b.low_throughput_bps >= b.high_throughput_bps {
            return Err(ConfigError::invalid(
                "buffer.low_throughput_bps",
                "must be below high_throughput_bps",
            ));
        }
        if self.backoff.initial_delay_ms > self.backoff.max_delay_ms {
            return Err(ConfigError::invalid(
                "backoff.initial_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        if self.relay.max_frame_bytes < b.min_chunk_bytes {
            return Err(ConfigError::invalid(
                "relay.max_frame_bytes",
                "must be at least buffer.min_chunk_bytes",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = GuardianConfig::default();
        config.check().unwrap();
        assert_eq!(config.breaker.max_events_in_history, 1000);
        assert_eq!(config.worker.max_sockets, 8);
        assert_eq!(config.worker.max_attempts, 3);
    }

    #[test]
    fn test_health_set_is_more_lenient() {
        let b = BreakerSettings::default();
        assert!(b.health_check.failure_threshold > b.forward_audio.failure_threshold);
        assert!(b.health_check.reset_timeout_ms > b.forward_audio.reset_timeout_ms);
        assert!(b.health_check.error_percentage_threshold > b.forward_audio.error_percentage_threshold);
        assert_eq!(b.config_for("healthCheck"), &b.health_check);
        assert_eq!(b.config_for("somethingElse"), &b.forward_audio);
    }

    #[test]
    fn test_env_overrides_apply() {
        let config = GuardianConfig::from_lookup(lookup(&[
            ("GUARDIAN_PORT", "9090"),
            ("GUARDIAN_AI_WORKER_URL", "http://worker:8001"),
            ("GUARDIAN_ENABLE_CIRCUIT_BREAKER", "false"),
            ("GUARDIAN_CB_FORWARD_AUDIO_FAILURE_THRESHOLD", "3"),
            ("GUARDIAN_CB_HEALTH_CHECK_RESET_TIMEOUT_MS", "120000"),
            ("GUARDIAN_BACKOFF_JITTER", "off"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.worker.base_url, "http://worker:8001");
        assert!(!config.breaker.enable_circuit_breaker);
        assert_eq!(config.breaker.forward_audio.failure_threshold, 3);
        assert_eq!(config.breaker.health_check.reset_timeout_ms, 120_000);
        assert!(!config.backoff.jitter);
    }

    #[test]
    fn test_unparseable_override_names_the_variable() {
        let err = GuardianConfig::from_lookup(lookup(&[("GUARDIAN_AI_MAX_SOCKETS", "many")]))
            .unwrap_err();
        match err {
            ConfigError::ParseError { key, .. } => assert_eq!(key, "GUARDIAN_AI_MAX_SOCKETS"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_percentage_rejected() {
        let err = GuardianConfig::from_lookup(lookup(&[(
            "GUARDIAN_CB_MODERATION_ERROR_PERCENTAGE_THRESHOLD",
            "150",
        )]))
        .unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "breaker.moderation.error_percentage_threshold");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cross_field_buffer_bounds() {
        let mut config = GuardianConfig::default();
        config.buffer.min_buffer_bytes = 512 * 1024;
        let err = config.check().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "buffer.min_buffer_bytes"));
    }

    #[test]
    fn test_invalid_worker_url_rejected() {
        let err = GuardianConfig::from_lookup(lookup(&[("GUARDIAN_AI_WORKER_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
