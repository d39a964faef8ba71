//! # pw-core
//!
//! Core engine for Path Warden: the identity graph data model, the
//! attack-path detection engine with risk scoring, the response planner
//! with its approval gate, and the response executor with rollback and
//! durable state.

pub mod auth;
pub mod detection;
pub mod graph;
pub mod persist;
pub mod response;

pub use detection::{
    Alert, AttackPath, DetectionConfig, DetectionEngine, DetectionError, PathEdge, PlanHandler,
    ScanOutcome, ScanParams, Severity, ADMIN_PRIVILEGE_THRESHOLD, ALERTS_FILE,
    BLAST_RADIUS_CAP, BLAST_RADIUS_DEPTH, DEFAULT_SCAN_BUDGET, HIGH_PRIVILEGE_THRESHOLD,
    LOW_PRIVILEGE_THRESHOLD, MAX_PATH_DEPTH, MAX_RECOMMENDATIONS, MIN_PRIVILEGE_DELTA,
};
pub use graph::{
    Direction, Edge, EdgeKind, GraphError, GraphSnapshot, IdentityGraph, Node, NodeKind,
    ATTR_ACTION, DEFAULT_REACHABLE_DEPTH, GRAPH_SNAPSHOT_FILE, PRIVILEGE_MAX, PRIVILEGE_MIN,
};
pub use persist::{load_json, write_json, PersistError};
pub use response::effector::{Effector, EffectorError, EffectorOutcome};
pub use response::executor::{ResponseEngine, ResponseError, DEFAULT_PLAN_DEADLINE, RETRY_BACKOFF};
pub use response::model::{
    Action, ActionKind, ActionStatus, ActionTarget, Plan, PlanState, RESPONSE_STATE_FILE,
};

// Auth exports
pub use auth::password::{
    hash_password, validate_password_strength, verify_password, PasswordError,
};
pub use auth::store::{Role, UserRecord, UserStore, USERNAME_PATTERN, USERS_FILE};
pub use auth::token::{Claims, TokenSigner, DEFAULT_TOKEN_TTL_MINUTES};
pub use auth::AuthError;
