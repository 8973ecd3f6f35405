//! AI worker transport.
//!
//! [`SpeechWorker`] is the seam the session relay and health probe talk to;
//! [`WorkerClient`] is the pooled HTTP implementation.

mod client;
mod request_executor;


pub use client::{ForwardRequest, WorkerClient, WorkerStats};
pub use request_executor::{build_endpoint_url, build_http_client};

use async_trait::async_trait;
use guardian_types::{AsrResponse, ModerationResponse, RelayError};

#[async_trait]
pub trait SpeechWorker: Send + Sync {
    /// Send one audio frame and return the merged transcription result.
    ///
    /// A worker reply with `status: "error"` surfaces as
    /// [`RelayError::WorkerRejected`].
    async fn forward(&self, request: ForwardRequest) -> Result<AsrResponse, RelayError>;

    /// Classify transcript texts.
    async fn moderate(&self, texts: Vec<String>) -> Result<ModerationResponse, RelayError>;

    /// Liveness probe.
    async fn health_check(&self) -> Result<(), RelayError>;
}
