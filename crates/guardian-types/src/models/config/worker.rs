//! AI worker transport and retry configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Base URL of the AI worker, e.g. `http://127.0.0.1:8001`
    #[validate(url)]
    pub base_url: String,
    /// Shared secret sent as `x-api-key`
    #[validate(length(min = 1_u64))]
    pub api_key: String,
    #[validate(length(min = 1_u64))]
    pub stream_path: String,
    #[validate(length(min = 1_u64))]
    pub moderation_path: String,
    #[validate(length(min = 1_u64))]
    pub health_path: String,
    /// Per-request timeout
    #[validate(range(min = 100_u64, max = 120_000_u64))]
    pub request_timeout_ms: u64,
    #[validate(range(min = 100_u64, max = 60_000_u64))]
    pub connect_timeout_ms: u64,
    /// Hard ceiling on concurrent sockets to the worker
    #[validate(range(min = 1_usize, max = 256_usize))]
    pub max_sockets: usize,
    pub idle_timeout_ms: u64,
    #[validate(range(min = 1_u32, max = 10_u32))]
    pub max_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001".to_string(),
            api_key: "dev-secret".to_string(),
            stream_path: "/asr/stream".to_string(),
            moderation_path: "/moderation".to_string(),
            health_path: "/healthz".to_string(),
            request_timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            max_sockets: 8,
            idle_timeout_ms: 90_000,
            max_attempts: 3,
        }
    }
}

/// Exponential backoff between retry attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    #[validate(range(min = 1_u64))]
    pub initial_delay_ms: u64,
    #[validate(range(min = 1_u64))]
    pub max_delay_ms: u64,
    #[validate(range(min = 1.0, max = 10.0))]
    pub multiplier: f64,
    /// Apply ±25% jitter to each delay
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { initial_delay_ms: 100, max_delay_ms: 2_000, multiplier: 2.0, jitter: true }
    }
}
