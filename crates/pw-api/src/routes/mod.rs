//! API routes.

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod detect;
pub mod graph;
pub mod health;
pub mod ingest;
pub mod response;

use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .with_state(state)
}

/// API routes under the `/api` prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(graph::routes())
        .merge(ingest::routes())
        .merge(detect::routes())
        .merge(alerts::routes())
        .merge(response::routes())
        .merge(audit::routes())
}
