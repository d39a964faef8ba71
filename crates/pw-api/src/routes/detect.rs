//! Detection scan endpoint.

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use pw_core::ScanParams;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::dto::{ScanQuery, ScanResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the detection routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/detect/scan", post(run_scan))
}

/// Runs an attack-path scan and dispatches plan-worthy alerts.
async fn run_scan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ScanQuery>,
) -> Result<Json<ScanResponse>, ApiError> {
    let params = ScanParams {
        start_node: query.start_node,
        min_delta: query.min_delta,
        budget: None,
    };

    // The plan handler takes its own graph read, so the scan's lock must
    // be released before dispatch.
    let outcome = {
        let graph = state.graph.read().await;
        state.detection.scan(&graph, &params).await?
    };
    state.detection.dispatch(&outcome.alerts).await;

    info!(
        actor = %claims.sub,
        alerts = outcome.alerts.len(),
        sources = outcome.scanned_sources,
        "scan complete"
    );
    state
        .audit
        .append(
            "scan_completed",
            &claims.sub,
            params.start_node.as_deref(),
            "success",
            Some(&format!("{} alert(s)", outcome.alerts.len())),
        )
        .await;

    Ok(Json(ScanResponse {
        status: "scan_complete".to_string(),
        paths_detected: outcome.alerts.len(),
        alerts: outcome.alerts,
    }))
}
