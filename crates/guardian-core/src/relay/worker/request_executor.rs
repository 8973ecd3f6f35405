use bytes::Bytes;
use guardian_types::{RelayError, WorkerConfig};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

use crate::relay::prometheus;

/// Upstream bodies longer than this are cut in error values.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Build the shared keep-alive client for the worker.
///
/// Idle connections are reused most-recently-returned first by hyper's pool.
/// Concurrency is capped separately by the caller's semaphore.
pub fn build_http_client(config: &WorkerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .pool_max_idle_per_host(config.max_sockets)
        .pool_idle_timeout(Duration::from_millis(config.idle_timeout_ms))
        .tcp_keepalive(Duration::from_secs(30))
        .tcp_nodelay(true)
        .build()
}

/// Append `path` to `base`, keeping any path prefix on the base URL.
pub fn build_endpoint_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}"))
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push('…');
    cut
}

pub(crate) fn map_transport_error(err: &reqwest::Error, timeout: Duration) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout { after_ms: timeout.as_millis() as u64 }
    } else {
        RelayError::Network { message: err.to_string() }
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::Parse { message: e.to_string() })
}

/// One HTTP attempt: wait for a socket slot, send, classify, read the body.
pub(crate) async fn execute(
    sockets: &Semaphore,
    endpoint: &'static str,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Bytes, RelayError> {
    let _slot = sockets
        .acquire()
        .await
        .map_err(|_| RelayError::Network { message: "worker connection pool closed".into() })?;

    let started = Instant::now();
    let result = send(request, timeout).await;
    let label = match &result {
        Ok(_) => "2xx",
        Err(RelayError::UpstreamStatus { code, .. }) => prometheus::status_category(*code),
        Err(err) => err.kind(),
    };
    prometheus::record_worker_request(endpoint, label, started.elapsed());
    result
}

async fn send(request: RequestBuilder, timeout: Duration) -> Result<Bytes, RelayError> {
    let response =
        request.timeout(timeout).send().await.map_err(|e| map_transport_error(&e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::UpstreamStatus { code: status.as_u16(), body: truncate_body(&body) });
    }

    response.bytes().await.map_err(|e| map_transport_error(&e, timeout))
}
