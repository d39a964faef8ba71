//! Application state shared across handlers.

use async_trait::async_trait;
use pw_core::{
    Alert, DetectionEngine, IdentityGraph, PlanHandler, ResponseEngine, TokenSigner, UserStore,
};
use pw_ingest::Ingester;
use pw_observability::AuditLog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::warn;

use crate::rate_limit::LoginRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The identity graph; single writer (ingest), many readers.
    pub graph: Arc<RwLock<IdentityGraph>>,
    /// Detection engine owning the alert set.
    pub detection: Arc<DetectionEngine>,
    /// Response engine owning plans and their execution.
    pub responses: Arc<ResponseEngine>,
    /// Append-only audit trail.
    pub audit: Arc<AuditLog>,
    /// User registry.
    pub users: Arc<UserStore>,
    /// Bearer-token signer.
    pub tokens: TokenSigner,
    /// Pluggable ingester.
    pub ingester: Arc<dyn Ingester>,
    /// Per-IP limiter for the auth endpoints.
    pub login_limiter: Arc<LoginRateLimiter>,
    /// Data directory for the graph snapshot, if persistence is on.
    pub data_dir: Option<PathBuf>,
    /// Server start time for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Assembles the state and wires the detection-to-response handler
    /// slot.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        graph: IdentityGraph,
        detection: Arc<DetectionEngine>,
        responses: Arc<ResponseEngine>,
        audit: Arc<AuditLog>,
        users: Arc<UserStore>,
        tokens: TokenSigner,
        ingester: Arc<dyn Ingester>,
        data_dir: Option<PathBuf>,
    ) -> Self {
        let graph = Arc::new(RwLock::new(graph));
        detection
            .set_plan_handler(Arc::new(EnginePlanHandler {
                responses: responses.clone(),
                graph: graph.clone(),
            }))
            .await;
        Self {
            graph,
            detection,
            responses,
            audit,
            users,
            tokens,
            ingester,
            login_limiter: Arc::new(LoginRateLimiter::with_defaults()),
            data_dir,
            started_at: Instant::now(),
        }
    }

    /// Persists the current graph snapshot to `graph.snapshot`.
    pub async fn persist_graph(&self) {
        let Some(data_dir) = &self.data_dir else { return };
        let path = data_dir.join(pw_core::GRAPH_SNAPSHOT_FILE);
        let snapshot = self.graph.read().await.snapshot();
        if let Err(err) = pw_core::write_json(&path, &snapshot) {
            warn!(path = %path.display(), error = %err, "failed to persist graph snapshot");
            self.audit
                .append(
                    "persistence_write_failed",
                    "system",
                    Some(pw_core::GRAPH_SNAPSHOT_FILE),
                    "failure",
                    Some(&err.to_string()),
                )
                .await;
        }
    }
}

/// Production wiring of the detection handler slot: each plan-worthy
/// alert becomes a response plan.
struct EnginePlanHandler {
    responses: Arc<ResponseEngine>,
    graph: Arc<RwLock<IdentityGraph>>,
}

#[async_trait]
impl PlanHandler for EnginePlanHandler {
    async fn on_alert(&self, alert: &Alert) {
        let graph = self.graph.read().await;
        self.responses.create_plan(alert, &graph).await;
    }
}
