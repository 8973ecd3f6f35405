//! Adaptive buffer and chunk planner tuning.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BufferConfig {
    #[validate(range(min = 256_usize))]
    pub min_buffer_bytes: usize,
    pub max_buffer_bytes: usize,
    pub initial_buffer_bytes: usize,
    /// Samples required before the buffer adapts
    #[validate(range(min = 1_usize))]
    pub min_samples: usize,
    #[validate(range(min = 1_usize))]
    pub history_capacity: usize,
    pub high_latency_ms: u64,
    pub low_latency_ms: u64,
    pub low_throughput_bps: u64,
    pub high_throughput_bps: u64,
    #[validate(range(min = 2_usize))]
    pub min_chunk_bytes: usize,
    #[validate(range(min = 1_u64))]
    pub target_round_trip_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_buffer_bytes: 4 * 1024,
            max_buffer_bytes: 256 * 1024,
            initial_buffer_bytes: 32 * 1024,
            min_samples: 5,
            history_capacity: 50,
            high_latency_ms: 500,
            low_latency_ms: 100,
            low_throughput_bps: 64 * 1024,
            high_throughput_bps: 512 * 1024,
            min_chunk_bytes: 2 * 1024,
            target_round_trip_ms: 1_000,
        }
    }
}
