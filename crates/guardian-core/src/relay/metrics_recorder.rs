//! Rolling network sample history shared by the adaptive decisions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Latency charged to a failed request.
pub const FAILURE_PENALTY_LATENCY_MS: f64 = 5_000.0;
/// Throughput charged to a failed request.
pub const FAILURE_MIN_THROUGHPUT_BPS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub latency_ms: f64,
    pub throughput_bytes_per_sec: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Averages over the retained samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAverages {
    pub samples: usize,
    pub latency_ms: f64,
    pub throughput_bytes_per_sec: f64,
    pub success_rate: f64,
}

#[derive(Debug)]
pub struct MetricsRecorder {
    capacity: usize,
    samples: Mutex<VecDeque<NetworkSample>>,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, samples: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn record_success(&self, bytes: usize, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        // Sub-millisecond round trips would divide by ~0.
        let secs = latency.as_secs_f64().max(0.001);
        self.record(NetworkSample {
            latency_ms,
            throughput_bytes_per_sec: bytes as f64 / secs,
            success: true,
            timestamp: Utc::now(),
        });
    }

    pub fn record_failure(&self) {
        self.record(NetworkSample {
            latency_ms: FAILURE_PENALTY_LATENCY_MS,
            throughput_bytes_per_sec: FAILURE_MIN_THROUGHPUT_BPS,
            success: false,
            timestamp: Utc::now(),
        });
    }

    pub fn record(&self, sample: NetworkSample) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn averages(&self) -> Option<NetworkAverages> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let (latency, throughput, successes) =
            samples.iter().fold((0.0, 0.0, 0usize), |(l, t, s), sample| {
                (l + sample.latency_ms, t + sample.throughput_bytes_per_sec, s + usize::from(sample.success))
            });
        Some(NetworkAverages {
            samples: samples.len(),
            latency_ms: latency / n,
            throughput_bytes_per_sec: throughput / n,
            success_rate: successes as f64 / n,
        })
    }

    pub fn snapshot(&self) -> Vec<NetworkSample> {
        self.samples.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let recorder = MetricsRecorder::new(3);
        for _ in 0..5 {
            recorder.record_success(1000, Duration::from_millis(100));
        }
        recorder.record_failure();
        assert_eq!(recorder.len(), 3);
        let last = recorder.snapshot().pop().unwrap();
        assert!(!last.success);
    }

    #[test]
    fn test_failure_uses_penalty_values() {
        let recorder = MetricsRecorder::new(10);
        recorder.record_failure();
        let avg = recorder.averages().unwrap();
        assert_eq!(avg.latency_ms, FAILURE_PENALTY_LATENCY_MS);
        assert_eq!(avg.throughput_bytes_per_sec, FAILURE_MIN_THROUGHPUT_BPS);
        assert_eq!(avg.success_rate, 0.0);
    }

    #[test]
    fn test_averages_mix_success_and_failure() {
        let recorder = MetricsRecorder::new(10);
        assert!(recorder.averages().is_none());

        recorder.record_success(64_000, Duration::from_millis(500));
        recorder.record_success(64_000, Duration::from_millis(1500));
        let avg = recorder.averages().unwrap();
        assert_eq!(avg.samples, 2);
        assert!((avg.latency_ms - 1000.0).abs() < 1e-6);
        // 128000 B/s and ~42666 B/s
        assert!((avg.throughput_bytes_per_sec - 85_333.33).abs() < 1.0);
        assert_eq!(avg.success_rate, 1.0);
    }
}
