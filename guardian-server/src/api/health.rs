use axum::{extract::State, http::StatusCode, response::Json};
use guardian_core::relay::{ProbeStatus, WorkerStats};
use guardian_types::{operations, CircuitState};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub circuits: BTreeMap<String, CircuitState>,
    pub worker: WorkerStats,
    pub probe: ProbeStatus,
}

/// Detailed status for operators.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let breakers = state.breakers();
    let circuits = operations::ALL
        .iter()
        .map(|op| ((*op).to_string(), breakers.get_state(op)))
        .collect();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        active_sessions: state.active_sessions(),
        circuits,
        worker: state.worker().stats(),
        probe: state.health_probe().status(),
    })
}

/// Liveness: the process is serving requests.
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Readiness: the last worker probe succeeded and audio forwarding is not
/// short-circuited.
pub async fn readiness(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let probe = state.health_probe().status();
    let forward = state.breakers().get_state(operations::FORWARD_AUDIO);

    let reason = if probe.healthy != Some(true) {
        Some(probe.last_error.unwrap_or_else(|| "worker not probed yet".to_string()))
    } else if forward == CircuitState::Open {
        Some(format!("{} circuit is open", operations::FORWARD_AUDIO))
    } else {
        None
    };

    match reason {
        None => Ok(Json(serde_json::json!({"status": "ready"}))),
        Some(reason) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not_ready", "reason": reason})),
        )),
    }
}
