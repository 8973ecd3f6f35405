// Relay pipeline: breaker-gated forwarding of session audio to the AI worker.
pub mod adaptive_buffer;
pub mod chunking;
pub mod circuit_breaker;
pub mod health;
pub mod hysteresis;
pub mod metrics_recorder;
pub mod prometheus;
pub mod retry;
pub mod session;
pub mod worker;

pub use adaptive_buffer::{BufferController, BufferDecision};
pub use chunking::{ChunkPlanner, ChunkingMetrics};
pub use circuit_breaker::{
    BroadcastListener, CircuitBreakerRegistry, CircuitEventListener, CircuitMetricsSnapshot,
    ListenerId,
};
pub use health::{ProbeStatus, WorkerHealthProbe};
pub use hysteresis::{DetectionHysteresis, RawLabel, SessionDetectionState};
pub use metrics_recorder::{MetricsRecorder, NetworkAverages, NetworkSample};
pub use retry::RetryPolicy;
pub use session::{AudioSessionRelay, FrameOutcome, FrameSender};
pub use worker::{ForwardRequest, SpeechWorker, WorkerClient, WorkerStats};
