//! Adaptive target buffer sizing.
//!
//! Grows the buffer when the link looks slow or congested, shrinks it when
//! round trips are fast and throughput is high. Changes are multiplicative
//! and clamped to `[min_buffer_bytes, max_buffer_bytes]`.

use guardian_types::BufferConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::metrics_recorder::{MetricsRecorder, NetworkAverages};
use super::prometheus;

pub const GROW_FACTOR: f64 = 1.5;
pub const SHRINK_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDecision {
    /// Not enough samples, healthy link, or already at the bound
    Hold,
    Grow { from: usize, to: usize },
    Shrink { from: usize, to: usize },
}

#[derive(Debug)]
pub struct BufferController {
    config: BufferConfig,
    current: AtomicUsize,
}

impl BufferController {
    pub fn new(config: BufferConfig) -> Self {
        let initial =
            config.initial_buffer_bytes.clamp(config.min_buffer_bytes, config.max_buffer_bytes);
        prometheus::update_buffer_gauge(initial);
        Self { config, current: AtomicUsize::new(initial) }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Pure decision for a given current size and sample averages.
    pub fn decide(&self, current: usize, averages: Option<NetworkAverages>) -> BufferDecision {
        let Some(avg) = averages else {
            return BufferDecision::Hold;
        };
        if avg.samples < self.config.min_samples {
            return BufferDecision::Hold;
        }

        let slow = avg.latency_ms > self.config.high_latency_ms as f64
            || avg.throughput_bytes_per_sec < self.config.low_throughput_bps as f64;
        let fast = avg.latency_ms < self.config.low_latency_ms as f64
            && avg.throughput_bytes_per_sec > self.config.high_throughput_bps as f64;

        let factor = if slow {
            GROW_FACTOR
        } else if fast {
            SHRINK_FACTOR
        } else {
            return BufferDecision::Hold;
        };

        let target = ((current as f64 * factor) as usize)
            .clamp(self.config.min_buffer_bytes, self.config.max_buffer_bytes);
        match target.cmp(&current) {
            std::cmp::Ordering::Greater => BufferDecision::Grow { from: current, to: target },
            std::cmp::Ordering::Less => BufferDecision::Shrink { from: current, to: target },
            std::cmp::Ordering::Equal => BufferDecision::Hold,
        }
    }

    /// Re-evaluate against the recorder and apply any change.
    pub fn adjust(&self, recorder: &MetricsRecorder) -> BufferDecision {
        let averages = recorder.averages();
        let current = self.current();
        let decision = self.decide(current, averages);

        let (to, direction) = match decision {
            BufferDecision::Hold => return decision,
            BufferDecision::Grow { to, .. } => (to, "grow"),
            BufferDecision::Shrink { to, .. } => (to, "shrink"),
        };
        // Another sender may have adjusted concurrently; last writer wins.
        self.current.store(to, Ordering::Relaxed);
        prometheus::update_buffer_gauge(to);
        if let Some(avg) = averages {
            info!(
                from = current,
                to,
                direction,
                avg_latency_ms = avg.latency_ms,
                avg_throughput_bps = avg.throughput_bytes_per_sec,
                "Adaptive buffer resized"
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn averages(samples: usize, latency_ms: f64, throughput: f64) -> Option<NetworkAverages> {
        Some(NetworkAverages {
            samples,
            latency_ms,
            throughput_bytes_per_sec: throughput,
            success_rate: 1.0,
        })
    }

    #[test]
    fn test_holds_until_min_samples() {
        let ctl = BufferController::new(BufferConfig::default());
        assert_eq!(ctl.decide(32_768, None), BufferDecision::Hold);
        assert_eq!(ctl.decide(32_768, averages(4, 900.0, 10.0)), BufferDecision::Hold);
    }

    #[test]
    fn test_grows_on_high_latency_or_low_throughput() {
        let ctl = BufferController::new(BufferConfig::default());
        assert_eq!(
            ctl.decide(32_768, averages(5, 600.0, 1_000_000.0)),
            BufferDecision::Grow { from: 32_768, to: 49_152 }
        );
        assert_eq!(
            ctl.decide(32_768, averages(5, 200.0, 1_000.0)),
            BufferDecision::Grow { from: 32_768, to: 49_152 }
        );
    }

    #[test]
    fn test_shrinks_on_fast_link() {
        let ctl = BufferController::new(BufferConfig::default());
        assert_eq!(
            ctl.decide(32_768, averages(5, 50.0, 1_000_000.0)),
            BufferDecision::Shrink { from: 32_768, to: 24_576 }
        );
    }

    #[test]
    fn test_holds_between_thresholds() {
        let ctl = BufferController::new(BufferConfig::default());
        assert_eq!(ctl.decide(32_768, averages(5, 300.0, 200_000.0)), BufferDecision::Hold);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let ctl = BufferController::new(BufferConfig::default());
        assert_eq!(
            ctl.decide(200_000, averages(5, 900.0, 10.0)),
            BufferDecision::Grow { from: 200_000, to: 262_144 }
        );
        assert_eq!(ctl.decide(262_144, averages(5, 900.0, 10.0)), BufferDecision::Hold);
        assert_eq!(ctl.decide(4_096, averages(5, 10.0, 10_000_000.0)), BufferDecision::Hold);
    }

    #[test]
    fn test_adjust_applies_to_current() {
        let ctl = BufferController::new(BufferConfig::default());
        let recorder = MetricsRecorder::new(50);
        for _ in 0..5 {
            recorder.record_failure();
        }
        assert!(matches!(ctl.adjust(&recorder), BufferDecision::Grow { .. }));
        assert_eq!(ctl.current(), 49_152);

        let fast = MetricsRecorder::new(50);
        for _ in 0..5 {
            fast.record_success(100_000, Duration::from_millis(20));
        }
        assert!(matches!(ctl.adjust(&fast), BufferDecision::Shrink { .. }));
        assert_eq!(ctl.current(), 36_864);
    }
}
