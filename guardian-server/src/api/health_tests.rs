use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Json;
use guardian_core::relay::prometheus;
use guardian_types::{operations, CircuitState};

use super::health::{health, liveness, readiness};
use super::metrics::get_metrics;
use crate::test_helpers::test_app_state;

#[tokio::test]
async fn test_liveness_is_ok() {
    let Json(body) = liveness().await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_reports_worker_and_circuits() {
    let state = test_app_state();
    let session = state.track_session();

    let Json(response) = health(State(state.clone())).await;
    assert_eq!(response.status, "ok");
    assert_eq!(response.active_sessions, 1);
    assert_eq!(response.circuits.len(), 3);
    assert_eq!(response.circuits.get(operations::FORWARD_AUDIO), Some(&CircuitState::Closed));
    assert_eq!(response.worker.max_sockets, 8);
    assert_eq!(response.worker.available_sockets, 8);
    assert_eq!(response.probe.healthy, None);

    drop(session);
    assert_eq!(state.active_sessions(), 0);
}

#[tokio::test]
async fn test_not_ready_before_first_probe() {
    let state = test_app_state();
    let (status, Json(body)) = readiness(State(state)).await.expect_err("not probed");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "worker not probed yet");
}

#[tokio::test]
async fn test_metrics_is_prometheus_text() {
    let _ = prometheus::init_metrics();
    let response = get_metrics().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );
}
