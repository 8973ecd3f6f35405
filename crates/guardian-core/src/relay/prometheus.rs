//! Prometheus metrics for Speech Guardian observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `circuit_breaker_state{operation}` - Gauge, 0 closed / 1 open / 2 half_open
//! - `circuit_breaker_requests_total{operation,outcome}` - Counter of calls executed
//! - `circuit_breaker_failures_total{operation}` - Counter of failed calls
//! - `circuit_breaker_request_duration_seconds{operation}` - Histogram of call durations
//! - `circuit_breaker_rejections_total{operation}` - Counter of fast-failed calls
//! - `circuit_breaker_transitions_total{operation,to}` - Counter of state changes
//! - `guardian_worker_requests_total{endpoint,status}` - Counter of HTTP attempts to the worker
//! - `guardian_worker_request_duration_seconds{endpoint}` - Histogram of attempt durations
//! - `guardian_worker_retries_total{endpoint}` - Counter of retried attempts
//! - `guardian_adaptive_buffer_bytes` - Gauge of the current target buffer
//! - `guardian_chunk_size_bytes` - Gauge of the last planned chunk size
//! - `guardian_active_sessions` - Gauge of open audio sessions
//! - `guardian_detections_total{label}` - Counter of stable label transitions
//! - `guardian_uptime_seconds` - Gauge of server uptime

use guardian_types::{CircuitEvent, CircuitState, StableLabel};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global server start time for uptime calculation
static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Histogram buckets for the relay's sub-2s latency budget.
const RELAY_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, // fail-fast and local worker
    0.25, 0.5, 1.0, 2.0, // normal transcription round trips
    5.0, 10.0, // timeouts
];

/// Initialize the Prometheus recorder. Safe to call more than once.
///
/// Returns the handle that can be used to render metrics as text.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let _guard = INIT_LOCK.lock();
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let _ = METRICS_START_TIME.get_or_init(Instant::now);

    let handle = PrometheusBuilder::new().set_buckets(RELAY_LATENCY_BUCKETS)?.install_recorder()?;

    describe_gauge!(
        "circuit_breaker_state",
        "Circuit breaker state per operation (0=closed, 1=open, 2=half_open)"
    );
    describe_counter!("circuit_breaker_requests_total", "Calls executed through the breaker");
    describe_counter!("circuit_breaker_failures_total", "Calls that returned an error");
    describe_histogram!(
        "circuit_breaker_request_duration_seconds",
        "Duration of calls executed through the breaker"
    );
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Calls rejected without execution while the circuit was open"
    );
    describe_counter!("circuit_breaker_transitions_total", "Circuit breaker state changes");
    describe_counter!("guardian_worker_requests_total", "HTTP attempts sent to the AI worker");
    describe_histogram!(
        "guardian_worker_request_duration_seconds",
        "Duration of individual AI worker HTTP attempts"
    );
    describe_counter!("guardian_worker_retries_total", "AI worker attempts that were retried");
    describe_gauge!("guardian_adaptive_buffer_bytes", "Current adaptive buffer target in bytes");
    describe_gauge!("guardian_chunk_size_bytes", "Last planned chunk size in bytes");
    describe_gauge!("guardian_active_sessions", "Open audio sessions");
    describe_counter!("guardian_detections_total", "Stable moderation label transitions");
    describe_gauge!("guardian_uptime_seconds", "Server uptime in seconds");

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
/// Returns None if metrics have not been initialized.
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

pub fn record_breaker_state(operation: &str, state: CircuitState) {
    gauge!("circuit_breaker_state", "operation" => operation.to_string()).set(state.as_gauge());
}

pub fn record_breaker_call(operation: &str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "circuit_breaker_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    if !success {
        counter!("circuit_breaker_failures_total", "operation" => operation.to_string())
            .increment(1);
    }
    histogram!("circuit_breaker_request_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_breaker_rejection(operation: &str) {
    counter!("circuit_breaker_rejections_total", "operation" => operation.to_string())
        .increment(1);
}

pub fn record_breaker_transition(event: &CircuitEvent) {
    record_breaker_state(&event.operation, event.new_state);
    counter!(
        "circuit_breaker_transitions_total",
        "operation" => event.operation.clone(),
        "to" => event.new_state.as_str()
    )
    .increment(1);
}

/// Record one HTTP attempt against the worker.
///
/// `status` is a status category (`2xx`, `5xx`) or an error kind (`timeout`, `network`).
pub fn record_worker_request(endpoint: &'static str, status: &str, duration: Duration) {
    counter!(
        "guardian_worker_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("guardian_worker_request_duration_seconds", "endpoint" => endpoint)
        .record(duration.as_secs_f64());
}

pub fn record_worker_retry(endpoint: &'static str) {
    counter!("guardian_worker_retries_total", "endpoint" => endpoint).increment(1);
}

pub fn update_buffer_gauge(bytes: usize) {
    gauge!("guardian_adaptive_buffer_bytes").set(bytes as f64);
}

pub fn update_chunk_gauge(bytes: usize) {
    gauge!("guardian_chunk_size_bytes").set(bytes as f64);
}

pub fn session_opened() {
    gauge!("guardian_active_sessions").increment(1.0);
}

pub fn session_closed() {
    gauge!("guardian_active_sessions").decrement(1.0);
}

pub fn record_detection(label: StableLabel) {
    let label = match label {
        StableLabel::Toxic => "toxic",
        StableLabel::Clean => "clean",
    };
    counter!("guardian_detections_total", "label" => label).increment(1);
}

/// Update uptime gauge.
pub fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("guardian_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    if let Some(handle) = get_prometheus_handle() {
        handle.render()
    } else {
        String::from("# Metrics not initialized\n")
    }
}

/// Categorize HTTP status code for metrics labels.
pub fn status_category(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}
