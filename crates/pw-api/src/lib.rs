//! # pw-api
//!
//! REST API server for Path Warden.
//!
//! Exposes the identity graph, detection scans, alerts, response-plan
//! approval and execution, and the audit trail over HTTP with
//! bearer-token authentication.

pub mod auth;
pub mod dto;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
