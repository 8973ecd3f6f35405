use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use guardian_core::CircuitMetricsSnapshot;
use guardian_types::{operations, CircuitEvent, CircuitState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

const DEFAULT_EVENT_LIMIT: usize = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitsResponse {
    pub enabled: bool,
    pub total_transitions: u64,
    pub circuits: Vec<CircuitMetricsSnapshot>,
}

/// Every well-known operation plus any breaker created for another key.
pub async fn list_circuits(State(state): State<AppState>) -> Json<CircuitsResponse> {
    let breakers = state.breakers();
    let mut keys: Vec<String> = operations::ALL.iter().map(|op| (*op).to_string()).collect();
    keys.extend(breakers.operations());
    keys.sort();
    keys.dedup();

    Json(CircuitsResponse {
        enabled: breakers.settings().enable_circuit_breaker,
        total_transitions: breakers.total_transitions(),
        circuits: keys.iter().map(|key| breakers.get_metrics(key)).collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Most recent transitions, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<CircuitEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(state.breakers().recent_events(limit))
}

#[derive(Debug, Default, Deserialize)]
pub struct ControlRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub operation: String,
    /// `false` when the breaker was already in the requested state
    pub changed: bool,
    pub state: CircuitState,
}

fn ensure_known(state: &AppState, key: &str) -> Result<(), (StatusCode, String)> {
    let known = operations::ALL.contains(&key)
        || state.breakers().operations().iter().any(|op| op == key);
    if known {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, format!("Unknown circuit: {key}")))
    }
}

pub async fn trip_circuit(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<ControlRequest>>,
) -> Result<Json<ControlResponse>, (StatusCode, String)> {
    ensure_known(&state, &key)?;
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_else(|| "manual trip".to_string());
    let breakers = state.breakers();
    let changed = breakers.force_trip(&key, &reason);
    info!(operation = %key, changed, %reason, "Circuit trip requested via API");
    Ok(Json(ControlResponse { state: breakers.get_state(&key), operation: key, changed }))
}

pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<ControlRequest>>,
) -> Result<Json<ControlResponse>, (StatusCode, String)> {
    ensure_known(&state, &key)?;
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_else(|| "manual reset".to_string());
    let breakers = state.breakers();
    let changed = breakers.force_reset(&key, &reason);
    info!(operation = %key, changed, %reason, "Circuit reset requested via API");
    Ok(Json(ControlResponse { state: breakers.get_state(&key), operation: key, changed }))
}
