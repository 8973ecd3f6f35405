//! `GUARDIAN_*` environment overrides.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

use super::breaker::CircuitConfig;
use super::GuardianConfig;

pub const ENV_PREFIX: &str = "GUARDIAN_";

/// Applies overrides from a key lookup onto an existing config.
pub(super) struct EnvOverrides<F> {
    lookup: F,
}

impl<F> EnvOverrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub(super) const fn new(lookup: F) -> Self {
        Self { lookup }
    }

    fn raw(&self, key: &str) -> Option<(String, String)> {
        let name = format!("{ENV_PREFIX}{key}");
        let value = (self.lookup)(&name)?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return None;
        }
        Some((name, value))
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some((_, value)) = self.raw(key) {
            *target = value;
        }
    }

    fn parse<T>(&self, key: &str, target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some((name, value)) = self.raw(key) {
            *target = value.parse().map_err(|e: T::Err| ConfigError::ParseError {
                key: name,
                message: format!("{value:?}: {e}"),
            })?;
        }
        Ok(())
    }

    fn flag(&self, key: &str, target: &mut bool) -> Result<(), ConfigError> {
        if let Some((name, value)) = self.raw(key) {
            *target = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::ParseError {
                        key: name,
                        message: format!("expected a boolean, got {other:?}"),
                    })
                },
            };
        }
        Ok(())
    }

    fn circuit(&self, set: &str, cfg: &mut CircuitConfig) -> Result<(), ConfigError> {
        self.parse(&format!("CB_{set}_FAILURE_THRESHOLD"), &mut cfg.failure_threshold)?;
        self.parse(&format!("CB_{set}_RESET_TIMEOUT_MS"), &mut cfg.reset_timeout_ms)?;
        self.parse(
            &format!("CB_{set}_REQUEST_VOLUME_THRESHOLD"),
            &mut cfg.request_volume_threshold,
        )?;
        self.parse(
            &format!("CB_{set}_ERROR_PERCENTAGE_THRESHOLD"),
            &mut cfg.error_percentage_threshold,
        )?;
        self.parse(
            &format!("CB_{set}_SLOW_CALL_DURATION_THRESHOLD_MS"),
            &mut cfg.slow_call_duration_threshold_ms,
        )?;
        self.parse(
            &format!("CB_{set}_SLOW_CALL_PERCENTAGE_THRESHOLD"),
            &mut cfg.slow_call_percentage_threshold,
        )
    }

    pub(super) fn apply(&self, config: &mut GuardianConfig) -> Result<(), ConfigError> {
        self.string("HOST", &mut config.server.host);
        self.parse("PORT", &mut config.server.port)?;

        let worker = &mut config.worker;
        self.string("AI_WORKER_URL", &mut worker.base_url);
        self.string("AI_WORKER_API_KEY", &mut worker.api_key);
        self.string("AI_STREAM_PATH", &mut worker.stream_path);
        self.string("AI_MODERATION_PATH", &mut worker.moderation_path);
        self.string("AI_HEALTH_PATH", &mut worker.health_path);
        self.parse("AI_REQUEST_TIMEOUT_MS", &mut worker.request_timeout_ms)?;
        self.parse("AI_CONNECT_TIMEOUT_MS", &mut worker.connect_timeout_ms)?;
        self.parse("AI_MAX_SOCKETS", &mut worker.max_sockets)?;
        self.parse("AI_IDLE_TIMEOUT_MS", &mut worker.idle_timeout_ms)?;
        self.parse("AI_MAX_ATTEMPTS", &mut worker.max_attempts)?;

        let backoff = &mut config.backoff;
        self.parse("BACKOFF_INITIAL_DELAY_MS", &mut backoff.initial_delay_ms)?;
        self.parse("BACKOFF_MAX_DELAY_MS", &mut backoff.max_delay_ms)?;
        self.parse("BACKOFF_MULTIPLIER", &mut backoff.multiplier)?;
        self.flag("BACKOFF_JITTER", &mut backoff.jitter)?;

        let breaker = &mut config.breaker;
        self.flag("ENABLE_CIRCUIT_BREAKER", &mut breaker.enable_circuit_breaker)?;
        self.parse("CB_MAX_EVENTS_IN_HISTORY", &mut breaker.max_events_in_history)?;
        self.parse("CB_METRICS_WINDOW_SIZE_MS", &mut breaker.metrics_window_size_ms)?;
        self.circuit("FORWARD_AUDIO", &mut breaker.forward_audio)?;
        self.circuit("MODERATION", &mut breaker.moderation)?;
        self.circuit("HEALTH_CHECK", &mut breaker.health_check)?;

        let buffer = &mut config.buffer;
        self.parse("BUFFER_MIN_BYTES", &mut buffer.min_buffer_bytes)?;
        self.parse("BUFFER_MAX_BYTES", &mut buffer.max_buffer_bytes)?;
        self.parse("BUFFER_INITIAL_BYTES", &mut buffer.initial_buffer_bytes)?;
        self.parse("BUFFER_MIN_CHUNK_BYTES", &mut buffer.min_chunk_bytes)?;
        self.parse("BUFFER_TARGET_ROUND_TRIP_MS", &mut buffer.target_round_trip_ms)?;

        let relay = &mut config.relay;
        self.parse("RELAY_MAX_FRAME_BYTES", &mut relay.max_frame_bytes)?;
        self.flag("RELAY_MODERATE_TRANSCRIPTS", &mut relay.moderate_transcripts)?;
        self.parse("HEALTH_CHECK_INTERVAL_MS", &mut relay.health_check_interval_ms)?;

        Ok(())
    }
}
