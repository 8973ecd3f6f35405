use axum::http::header;
use axum::response::{IntoResponse, Response};

use guardian_core::relay::prometheus;

pub async fn get_metrics() -> Response {
    let metrics = prometheus::render_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics).into_response()
}
