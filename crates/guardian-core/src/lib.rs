//! # Guardian Core
//!
//! Resilient real-time audio relay for Speech Guardian.
//!
//! ```text
//! guardian-core/src/relay/
//! ├── circuit_breaker/   # per-operation breaker registry, rolling window, listeners
//! ├── metrics_recorder   # rolling NetworkSample history
//! ├── adaptive_buffer    # grow/shrink target buffer from latency + throughput
//! ├── chunking           # dynamic chunk planner with EMA bookkeeping
//! ├── retry              # exponential backoff with jitter
//! ├── worker/            # pooled AI worker client (SpeechWorker)
//! ├── hysteresis         # per-session TOXIC/CLEAN smoothing
//! ├── session/           # per-connection orchestrator
//! ├── health             # background worker probe
//! └── prometheus         # metrics exposition
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards are scoped explicitly around breaker decisions"
)]
#![allow(
    clippy::redundant_else,
    reason = "Explicit else blocks improve readability in complex control flow"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::unwrap_used,
        clippy::assertions_on_result_states
    )
)]

pub mod error;
pub mod relay;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use relay::circuit_breaker::{CircuitBreakerRegistry, CircuitMetricsSnapshot};
pub use relay::health::WorkerHealthProbe;
pub use relay::session::AudioSessionRelay;
pub use relay::worker::{SpeechWorker, WorkerClient};
