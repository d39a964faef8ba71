//! # pw-ingest
//!
//! IAM metadata ingestion for Path Warden.
//!
//! The ingester translates cloud IAM API responses into the graph
//! primitives of the core data model. Every ingest is a full replacement:
//! the graph store swaps in the new node and edge sets wholesale. This
//! crate ships the contract and the deterministic mock ingester used in
//! development and tests; a live AWS ingester plugs in behind the same
//! trait.

pub mod mock;

pub use mock::MockIamIngester;

use async_trait::async_trait;
use pw_core::{Edge, Node};
use thiserror::Error;

/// Ingestion failures.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Credentials missing or rejected by the cloud API.
    #[error("cloud credentials not configured: {0}")]
    Credentials(String),

    /// The cloud API call failed.
    #[error("cloud API error: {0}")]
    Api(String),
}

/// Produces the full node and edge sets for a graph replacement.
#[async_trait]
pub trait Ingester: Send + Sync {
    /// Fetches (or generates) the complete IAM estate.
    async fn ingest(&self) -> Result<(Vec<Node>, Vec<Edge>), IngestError>;
}
