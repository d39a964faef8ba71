//! Request and response DTOs.

use pw_core::{Alert, Edge, Node, Plan};
use pw_observability::AuditEntry;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status string.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Desired username, `[A-Za-z0-9_.-]{3,32}`.
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    /// Password meeting the complexity rules.
    #[validate(length(min = 8))]
    pub password: String,
}

/// Registration response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub username: String,
    pub role: String,
}

/// Login form (form-urlencoded).
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Bearer token response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: String,
}

/// Full graph response.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Graph statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphStatsResponse {
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// Principal listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentitiesResponse {
    pub identities: Vec<Node>,
    pub count: usize,
}

/// Ingest trigger result.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub nodes: usize,
    pub edges: usize,
}

/// Scan trigger result.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    pub paths_detected: usize,
    pub alerts: Vec<Alert>,
}

/// Scan query parameters.
#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub start_node: Option<String>,
    pub min_delta: Option<i32>,
}

/// Alert listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub count: usize,
}

/// Alert purge result.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// Plan listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
    pub count: usize,
}

/// Reject query parameter.
#[derive(Debug, Deserialize)]
pub struct RejectQuery {
    pub reason: Option<String>,
}

/// Audit log listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogsResponse {
    pub logs: Vec<AuditEntry>,
    pub count: usize,
}
