//! The effector contract.
//!
//! The effector is the boundary adapter that performs or reverses a
//! cloud-mutating action on behalf of the executor. It is the only
//! component permitted to make cloud-mutating calls, and it promises
//! idempotency for each action kind: repeating an identical call must
//! leave the cloud in the same state.

use crate::response::model::{ActionKind, ActionTarget};
use async_trait::async_trait;
use thiserror::Error;

/// Effector failures, split by whether the executor should retry.
#[derive(Error, Debug, Clone)]
pub enum EffectorError {
    /// Retriable (throttling, timeouts, transient API errors).
    #[error("transient effector failure: {0}")]
    Transient(String),

    /// Non-retriable (missing entity, permission denied, bad request).
    #[error("permanent effector failure: {0}")]
    Permanent(String),
}

impl EffectorError {
    /// Whether the executor's retry policy applies.
    pub fn is_transient(&self) -> bool {
        matches!(self, EffectorError::Transient(_))
    }
}

/// Successful effector invocation.
#[derive(Debug, Clone)]
pub struct EffectorOutcome {
    /// Human-readable result recorded on the action.
    pub result: String,
    /// State needed to undo the action, when the kind supports it.
    pub rollback_data: Option<serde_json::Value>,
}

impl EffectorOutcome {
    /// Outcome without rollback state.
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            rollback_data: None,
        }
    }

    /// Attaches a rollback descriptor.
    pub fn with_rollback(mut self, rollback_data: serde_json::Value) -> Self {
        self.rollback_data = Some(rollback_data);
        self
    }
}

/// Pluggable boundary that performs and reverses cloud-side actions.
#[async_trait]
pub trait Effector: Send + Sync {
    /// Performs the action against the cloud. Must be idempotent per kind.
    async fn execute(
        &self,
        kind: ActionKind,
        target: &ActionTarget,
    ) -> Result<EffectorOutcome, EffectorError>;

    /// Reverses a previously executed action using its stored descriptor.
    async fn rollback(
        &self,
        kind: ActionKind,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError>;
}
