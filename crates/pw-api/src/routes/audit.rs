//! Audit trail endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use pw_observability::AuditFilter;

use crate::auth::RequireAdmin;
use crate::dto::AuditLogsResponse;
use crate::state::AppState;

/// Creates the audit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/audit/logs", get(list_logs))
        .route("/audit/truncate", post(truncate_logs))
}

/// Audit entries in chronological order, optionally filtered by
/// action/actor/status query parameters.
async fn list_logs(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<AuditFilter>,
) -> Json<AuditLogsResponse> {
    let logs = state.audit.list(&filter).await;
    let count = logs.len();
    Json(AuditLogsResponse { logs, count })
}

/// Explicit admin operation that clears the audit log, on disk included.
async fn truncate_logs(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
) -> Json<AuditLogsResponse> {
    state.audit.truncate(&claims.sub).await;
    let logs = state.audit.list(&AuditFilter::default()).await;
    let count = logs.len();
    Json(AuditLogsResponse { logs, count })
}
