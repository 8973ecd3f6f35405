//! Rolling call window used for rate-based tripping.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    failed: bool,
    slow: bool,
}

/// Totals over the live portion of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCounts {
    pub total_requests: u32,
    pub failures: u32,
    pub slow_calls: u32,
}

impl WindowCounts {
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failures, self.total_requests)
    }

    pub fn slow_call_rate(&self) -> f64 {
        percentage(self.slow_calls, self.total_requests)
    }
}

fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(total)
    }
}

#[derive(Debug)]
pub(crate) struct MetricsWindow {
    span: Duration,
    records: VecDeque<CallRecord>,
    counts: WindowCounts,
}

impl MetricsWindow {
    pub(crate) fn new(span: Duration) -> Self {
        Self { span, records: VecDeque::new(), counts: WindowCounts::default() }
    }

    pub(crate) fn record(&mut self, now: Instant, failed: bool, slow: bool) {
        self.evict(now);
        self.records.push_back(CallRecord { at: now, failed, slow });
        self.counts.total_requests += 1;
        self.counts.failures += u32::from(failed);
        self.counts.slow_calls += u32::from(slow);
    }

    pub(crate) fn counts(&mut self, now: Instant) -> WindowCounts {
        self.evict(now);
        self.counts
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.counts = WindowCounts::default();
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.records.front() {
            if now.duration_since(front.at) < self.span {
                break;
            }
            self.counts.total_requests -= 1;
            self.counts.failures -= u32::from(front.failed);
            self.counts.slow_calls -= u32::from(front.slow);
            self.records.pop_front();
        }
    }
}
