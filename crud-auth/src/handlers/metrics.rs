use axum::{extract::State, http::header, response::IntoResponse};

use crate::AppState;

/// Prometheus text exposition of everything recorded through `metrics`.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
