//! Alert listing and purge endpoints.

use axum::{extract::State, routing::get, routing::post, Json, Router};

use crate::auth::{AuthenticatedUser, RequireAdmin};
use crate::dto::{AlertsResponse, PurgeResponse};
use crate::state::AppState;

/// Creates the alert routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/purge", post(purge_alerts))
}

/// All retained alerts, severity-sorted.
async fn list_alerts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<AlertsResponse> {
    let alerts = state.detection.alerts().await;
    let count = alerts.len();
    Json(AlertsResponse { alerts, count })
}

/// Explicitly discards all retained alerts.
async fn purge_alerts(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
) -> Json<PurgeResponse> {
    let purged = state.detection.purge().await;
    state
        .audit
        .append(
            "alerts_purged",
            &claims.sub,
            None,
            "success",
            Some(&format!("{purged} alert(s) discarded")),
        )
        .await;
    Json(PurgeResponse { purged })
}
