use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .route("/ws/audio", get(api::ws::audio_socket))
        .route("/metrics", get(api::metrics::get_metrics))
        .route("/health", get(api::health::health))
        .route("/healthz", get(api::health::liveness))
        .route("/readyz", get(api::health::readiness))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}
