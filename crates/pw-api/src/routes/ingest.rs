//! Ingestion trigger endpoint.

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::dto::IngestResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the ingest routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/ingest/aws", post(ingest_aws))
}

/// Runs the configured ingester and replaces the graph wholesale.
async fn ingest_aws(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<IngestResponse>, ApiError> {
    let (nodes, edges) = state
        .ingester
        .ingest()
        .await
        .map_err(|err| ApiError::External(err.to_string()))?;

    let (node_count, edge_count) = {
        let mut graph = state.graph.write().await;
        graph.replace_all(nodes, edges)?;
        (graph.node_count(), graph.edge_count())
    };
    state.persist_graph().await;

    info!(nodes = node_count, edges = edge_count, "graph replaced by ingest");
    state
        .audit
        .append(
            "ingest_completed",
            &claims.sub,
            None,
            "success",
            Some(&format!("{node_count} nodes, {edge_count} edges")),
        )
        .await;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        nodes: node_count,
        edges: edge_count,
    }))
}
