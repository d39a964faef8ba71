//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::HealthResponse;
use crate::state::AppState;

/// Creates the health routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness plus uptime.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    ),
    tag = "Health"
)]
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pathwarden".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
