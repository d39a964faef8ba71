//! Response plan endpoints: approval, execution, and rollback.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use pw_core::{Action, Plan};

use crate::auth::RequireAdmin;
use crate::dto::{PlansResponse, RejectQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the response routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/response/pending", get(pending_plans))
        .route("/response/history", get(plan_history))
        .route("/response/approve/:plan_id", post(approve_plan))
        .route("/response/reject/:plan_id", post(reject_plan))
        .route("/response/execute/:plan_id", post(execute_plan))
        .route("/response/rollback/:action_id", post(rollback_action))
}

/// Plans awaiting human approval.
async fn pending_plans(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Json<PlansResponse> {
    let plans = state.responses.pending().await;
    let count = plans.len();
    Json(PlansResponse { plans, count })
}

/// Terminal plans: completed, failed, and rejected.
async fn plan_history(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Json<PlansResponse> {
    let plans = state.responses.history().await;
    let count = plans.len();
    Json(PlansResponse { plans, count })
}

/// Approves a pending plan.
async fn approve_plan(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan = state.responses.approve(&plan_id, &claims.sub).await?;
    Ok(Json(plan))
}

/// Rejects a pending plan.
async fn reject_plan(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
    Path(plan_id): Path<String>,
    Query(query): Query<RejectQuery>,
) -> Result<Json<Plan>, ApiError> {
    let reason = query
        .reason
        .unwrap_or_else(|| "rejected by analyst".to_string());
    let plan = state.responses.reject(&plan_id, &claims.sub, &reason).await?;
    Ok(Json(plan))
}

/// Executes an approved plan, or re-runs a completed one.
async fn execute_plan(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan = state.responses.execute(&plan_id, &claims.sub).await?;
    Ok(Json(plan))
}

/// Rolls back one completed, reversible action.
async fn rollback_action(
    State(state): State<AppState>,
    RequireAdmin(claims): RequireAdmin,
    Path(action_id): Path<String>,
) -> Result<Json<Action>, ApiError> {
    let action = state.responses.rollback(&action_id, &claims.sub).await?;
    Ok(Json(action))
}
