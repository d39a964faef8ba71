//! Graph inspection endpoints.

use axum::{extract::State, routing::get, Json, Router};

use crate::auth::AuthenticatedUser;
use crate::dto::{GraphResponse, GraphStatsResponse, IdentitiesResponse};
use crate::state::AppState;

/// Creates the graph routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/graph", get(get_graph))
        .route("/graph/stats", get(get_graph_stats))
        .route("/identities", get(list_identities))
}

/// Full node and edge snapshot for visualization.
async fn get_graph(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<GraphResponse> {
    let snapshot = state.graph.read().await.snapshot();
    Json(GraphResponse {
        nodes: snapshot.nodes,
        edges: snapshot.edges,
    })
}

/// Node and edge counts.
async fn get_graph_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<GraphStatsResponse> {
    let graph = state.graph.read().await;
    Json(GraphStatsResponse {
        total_nodes: graph.node_count(),
        total_edges: graph.edge_count(),
    })
}

/// Nodes of principal kinds (users, groups, roles).
async fn list_identities(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<IdentitiesResponse> {
    let graph = state.graph.read().await;
    let identities: Vec<_> = graph
        .nodes()
        .filter(|n| n.kind.is_principal())
        .cloned()
        .collect();
    let count = identities.len();
    Json(IdentitiesResponse { identities, count })
}
