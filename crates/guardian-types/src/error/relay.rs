//! Errors surfaced along the audio relay path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while forwarding audio to the AI worker.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RelayError {
    /// Circuit breaker rejected the call without contacting the worker
    #[error("Circuit open for {operation}, retry in {retry_after_ms}ms")]
    CircuitOpen { operation: String, retry_after_ms: u64 },

    /// Transport failure (connect refused, reset, truncated body)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Per-request timeout elapsed
    #[error("Request timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Worker answered with a non-success HTTP status
    #[error("Upstream returned status {code}")]
    UpstreamStatus { code: u16, body: String },

    /// Worker body is not valid JSON or fails shape checks
    #[error("Malformed worker response: {message}")]
    Parse { message: String },

    /// Worker replied `status: "error"`
    #[error("Worker rejected request: {message}")]
    WorkerRejected { message: String },

    /// Client frame could not be accepted
    #[error("Invalid audio frame: {message}")]
    InvalidFrame { message: String },
}

impl RelayError {
    /// Transient failures worth another attempt within the client.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::UpstreamStatus { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }

    /// Rejections produced by the breaker itself rather than the downstream call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::Parse { .. } => "parse",
            Self::WorkerRejected { .. } => "worker_rejected",
            Self::InvalidFrame { .. } => "invalid_frame",
        }
    }

    /// Message safe to show to the connected client.
    pub fn client_message(&self) -> String {
        match self {
            Self::CircuitOpen { .. } => {
                "Transcription service temporarily unavailable".to_string()
            },
            Self::UpstreamStatus { code, .. } => {
                format!("Transcription service returned status {}", code)
            },
            other => other.to_string(),
        }
    }
}
