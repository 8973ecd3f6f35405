//! Dynamic chunk sizing for outbound audio.
//!
//! `optimal = buffer * latency_factor / (1 + backlog)` where
//! `latency_factor = clamp(target_rt / round_trip, 0.25, 1.0)`,
//! clamped to `[min_chunk_bytes, buffer]` and rounded down to an even byte
//! count so 16-bit PCM samples never straddle two chunks.
//!
//! The worker does not report its processing time, so network and worker time
//! cannot be told apart. `round_trip` is the EMA of whole per-chunk latency
//! (transfer, worker processing and retries) once a chunk has been sent, and
//! the recorder's per-attempt network average before that.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

use super::prometheus;

/// EMA weight for chunk size and per-chunk latency.
pub const EMA_ALPHA: f64 = 0.2;
const MIN_LATENCY_FACTOR: f64 = 0.25;
const MAX_LATENCY_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingMetrics {
    pub total_chunks_ever_sent: u64,
    pub average_chunk_size: f64,
    pub average_chunking_latency_ms: f64,
    pub last_optimal_chunk_size: usize,
}

#[derive(Debug)]
pub struct ChunkPlanner {
    min_chunk_bytes: usize,
    target_round_trip_ms: f64,
    metrics: Mutex<ChunkingMetrics>,
}

impl ChunkPlanner {
    pub fn new(min_chunk_bytes: usize, target_round_trip_ms: u64) -> Self {
        Self {
            min_chunk_bytes: min_chunk_bytes.max(2),
            target_round_trip_ms: target_round_trip_ms as f64,
            metrics: Mutex::new(ChunkingMetrics::default()),
        }
    }

    pub fn metrics(&self) -> ChunkingMetrics {
        *self.metrics.lock()
    }

    /// Chunk size for the next payload.
    ///
    /// `avg_network_latency_ms` is the recorder's rolling average, used until
    /// the first chunk has been timed.
    /// `backlog` is the number of frames queued behind this one.
    pub fn optimal_chunk_size(
        &self,
        buffer: usize,
        avg_network_latency_ms: Option<f64>,
        backlog: usize,
    ) -> usize {
        let round_trip = {
            let m = self.metrics.lock();
            if m.total_chunks_ever_sent > 0 {
                m.average_chunking_latency_ms
            } else {
                avg_network_latency_ms.unwrap_or(0.0)
            }
        };
        let latency_factor = if round_trip > 0.0 {
            (self.target_round_trip_ms / round_trip).clamp(MIN_LATENCY_FACTOR, MAX_LATENCY_FACTOR)
        } else {
            MAX_LATENCY_FACTOR
        };

        let raw = buffer as f64 * latency_factor / (1 + backlog) as f64;
        let upper = buffer.max(self.min_chunk_bytes);
        let size = ((raw as usize).clamp(self.min_chunk_bytes, upper) & !1).max(2);

        self.metrics.lock().last_optimal_chunk_size = size;
        prometheus::update_chunk_gauge(size);
        size
    }

    /// Split `payload` into ordered chunks of at most `chunk_size` bytes.
    pub fn split(payload: &Bytes, chunk_size: usize) -> Vec<Bytes> {
        let chunk_size = chunk_size.max(1);
        (0..payload.len())
            .step_by(chunk_size)
            .map(|start| payload.slice(start..(start + chunk_size).min(payload.len())))
            .collect()
    }

    /// Fold one sent chunk into the moving averages.
    pub fn record_chunk(&self, size: usize, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let mut m = self.metrics.lock();
        if m.total_chunks_ever_sent == 0 {
            m.average_chunk_size = size as f64;
            m.average_chunking_latency_ms = latency_ms;
        } else {
            m.average_chunk_size = EMA_ALPHA * size as f64 + (1.0 - EMA_ALPHA) * m.average_chunk_size;
            m.average_chunking_latency_ms =
                EMA_ALPHA * latency_ms + (1.0 - EMA_ALPHA) * m.average_chunking_latency_ms;
        }
        m.total_chunks_ever_sent += 1;
    }
}
