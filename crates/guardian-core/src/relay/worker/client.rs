use async_trait::async_trait;
use bytes::Bytes;
use guardian_types::{
    AsrResponse, BackoffConfig, BufferConfig, GuardianConfig, ModerationRequest,
    ModerationResponse, RelayError, WorkerConfig,
};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::request_executor::{build_endpoint_url, build_http_client, execute, parse_body};
use super::SpeechWorker;
use crate::error::AppResult;
use crate::relay::adaptive_buffer::BufferController;
use crate::relay::chunking::{ChunkPlanner, ChunkingMetrics};
use crate::relay::metrics_recorder::{MetricsRecorder, NetworkAverages};
use crate::relay::retry::RetryPolicy;

const HEADER_SESSION_ID: &str = "x-session-id";
const HEADER_API_KEY: &str = "x-api-key";
const HEADER_CHUNK_INDEX: &str = "x-chunk-index";
const HEADER_CHUNK_COUNT: &str = "x-chunk-count";

const ENDPOINT_STREAM: &str = "asr_stream";
const ENDPOINT_MODERATION: &str = "moderation";
const ENDPOINT_HEALTH: &str = "healthz";

/// One audio frame bound for `/asr/stream`.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub session_id: String,
    pub audio: Bytes,
    /// Frames queued behind this one in the same session
    pub backlog: usize,
}

/// Adaptive transport state, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub buffer_bytes: usize,
    pub available_sockets: usize,
    pub max_sockets: usize,
    pub chunking: ChunkingMetrics,
    pub network: Option<NetworkAverages>,
}

#[derive(Debug)]
struct Endpoints {
    stream: Url,
    moderation: Url,
    health: Url,
}

/// Pooled HTTP client for the AI worker, shared by all sessions.
#[derive(Debug)]
pub struct WorkerClient {
    http: Client,
    endpoints: Endpoints,
    api_key: String,
    request_timeout: Duration,
    max_sockets: usize,
    sockets: Semaphore,
    retry: RetryPolicy,
    recorder: MetricsRecorder,
    buffer: BufferController,
    planner: ChunkPlanner,
}

impl WorkerClient {
    pub fn new(
        worker: &WorkerConfig,
        backoff: &BackoffConfig,
        buffer: &BufferConfig,
    ) -> AppResult<Self> {
        let endpoints = Endpoints {
            stream: build_endpoint_url(&worker.base_url, &worker.stream_path)?,
            moderation: build_endpoint_url(&worker.base_url, &worker.moderation_path)?,
            health: build_endpoint_url(&worker.base_url, &worker.health_path)?,
        };
        Ok(Self {
            http: build_http_client(worker)?,
            endpoints,
            api_key: worker.api_key.clone(),
            request_timeout: Duration::from_millis(worker.request_timeout_ms),
            max_sockets: worker.max_sockets,
            sockets: Semaphore::new(worker.max_sockets),
            retry: RetryPolicy::new(worker.max_attempts, backoff),
            recorder: MetricsRecorder::new(buffer.history_capacity),
            buffer: BufferController::new(buffer.clone()),
            planner: ChunkPlanner::new(buffer.min_chunk_bytes, buffer.target_round_trip_ms),
        })
    }

    pub fn from_config(config: &GuardianConfig) -> AppResult<Self> {
        Self::new(&config.worker, &config.backoff, &config.buffer)
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.recorder
    }

    pub fn buffer(&self) -> &BufferController {
        &self.buffer
    }

    pub fn planner(&self) -> &ChunkPlanner {
        &self.planner
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            buffer_bytes: self.buffer.current(),
            available_sockets: self.sockets.available_permits(),
            max_sockets: self.max_sockets,
            chunking: self.planner.metrics(),
            network: self.recorder.averages(),
        }
    }

    /// Send a single chunk with retry. Every attempt records a network sample;
    /// only a parsed `status: ok` answer counts as a success.
    async fn send_chunk(
        &self,
        session_id: &str,
        chunk: &Bytes,
        index: usize,
        count: usize,
    ) -> Result<AsrResponse, RelayError> {
        self.retry
            .run(ENDPOINT_STREAM, |_| async move {
                let request = self
                    .http
                    .post(self.endpoints.stream.clone())
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
                    .header(CONTENT_LENGTH, chunk.len())
                    .header(HEADER_SESSION_ID, session_id)
                    .header(HEADER_API_KEY, &self.api_key)
                    .header(HEADER_CHUNK_INDEX, index)
                    .header(HEADER_CHUNK_COUNT, count)
                    .body(chunk.clone());

                let started = Instant::now();
                let result = execute(&self.sockets, ENDPOINT_STREAM, request, self.request_timeout)
                    .await
                    .and_then(|body| parse_body::<AsrResponse>(&body));
                match &result {
                    Ok(response) if response.is_ok() => {
                        self.recorder.record_success(chunk.len(), started.elapsed());
                    },
                    // Unusable answers count as failures however fast they came back.
                    _ => self.recorder.record_failure(),
                }
                result
            })
            .await
    }
}

#[async_trait]
impl SpeechWorker for WorkerClient {
    async fn forward(&self, request: ForwardRequest) -> Result<AsrResponse, RelayError> {
        if request.audio.is_empty() {
            return Err(RelayError::InvalidFrame { message: "empty audio payload".into() });
        }

        let buffer = self.buffer.current();
        let avg_latency = self.recorder.averages().map(|a| a.latency_ms);
        let chunk_size = self.planner.optimal_chunk_size(buffer, avg_latency, request.backlog);
        let chunks = ChunkPlanner::split(&request.audio, chunk_size);
        let count = chunks.len();

        debug!(
            session_id = %request.session_id,
            bytes = request.audio.len(),
            chunk_size,
            chunks = count,
            backlog = request.backlog,
            "Forwarding audio to worker"
        );

        let mut responses = Vec::with_capacity(count);
        let mut outcome = Ok(());
        for (index, chunk) in chunks.iter().enumerate() {
            let started = Instant::now();
            match self.send_chunk(&request.session_id, chunk, index, count).await {
                Ok(response) => {
                    self.planner.record_chunk(chunk.len(), started.elapsed());
                    let rejected = !response.is_ok();
                    responses.push(response);
                    if rejected {
                        break;
                    }
                },
                Err(err) => {
                    outcome = Err(err);
                    break;
                },
            }
        }
        self.buffer.adjust(&self.recorder);
        outcome?;

        let merged = AsrResponse::merge(responses)
            .ok_or_else(|| RelayError::Parse { message: "no chunk responses".into() })?;
        if !merged.is_ok() {
            let message =
                merged.message.unwrap_or_else(|| "worker returned status error".to_string());
            warn!(session_id = %request.session_id, %message, "Worker rejected audio");
            return Err(RelayError::WorkerRejected { message });
        }
        Ok(merged)
    }

    async fn moderate(&self, texts: Vec<String>) -> Result<ModerationResponse, RelayError> {
        let body = ModerationRequest { inputs: texts };
        let expected = body.inputs.len();
        let response: ModerationResponse = self
            .retry
            .run(ENDPOINT_MODERATION, |_| {
                let request = self
                    .http
                    .post(self.endpoints.moderation.clone())
                    .header(HEADER_API_KEY, &self.api_key)
                    .json(&body);
                async move {
                    let bytes =
                        execute(&self.sockets, ENDPOINT_MODERATION, request, self.request_timeout)
                            .await?;
                    parse_body(&bytes)
                }
            })
            .await?;

        if response.results.len() != expected {
            return Err(RelayError::Parse {
                message: format!(
                    "moderation returned {} results for {} inputs",
                    response.results.len(),
                    expected
                ),
            });
        }
        Ok(response)
    }

    async fn health_check(&self) -> Result<(), RelayError> {
        let body: serde_json::Value = self
            .retry
            .run(ENDPOINT_HEALTH, |_| {
                let request = self
                    .http
                    .get(self.endpoints.health.clone())
                    .header(HEADER_API_KEY, &self.api_key);
                async move {
                    let bytes =
                        execute(&self.sockets, ENDPOINT_HEALTH, request, self.request_timeout)
                            .await?;
                    parse_body(&bytes)
                }
            })
            .await?;

        match body.get("status").and_then(|s| s.as_str()) {
            None | Some("ok") => Ok(()),
            Some(other) => Err(RelayError::WorkerRejected {
                message: format!("health status {other}"),
            }),
        }
    }
}
