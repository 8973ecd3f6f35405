//! API Routes
//!
//! `/api/*` breaker inspection and control. Audio and probe endpoints are
//! mounted at the top level by the router.

pub mod circuits;
pub mod health;
pub mod metrics;
pub mod ws;

#[cfg(test)]
mod health_tests;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/circuits", get(circuits::list_circuits))
        .route("/circuits/events", get(circuits::list_events))
        .route("/circuits/:key/trip", post(circuits::trip_circuit))
        .route("/circuits/:key/reset", post(circuits::reset_circuit))
}
