//! Action handler registry.
//!
//! Implements the core [`Effector`] contract by dispatching each action
//! kind to its registered handler. Handlers promise idempotency: the
//! executor may re-run a completed plan and every repeated call must
//! leave the cloud in the same state.

use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, Effector, EffectorError, EffectorOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::detach_policy::{DetachRolePolicyHandler, DetachUserPolicyHandler};
use crate::disable_login_profile::DisableLoginProfileHandler;
use crate::mock::MockCloud;
use crate::notify_operator::NotifyOperatorHandler;
use crate::quarantine_role::QuarantineRoleHandler;
use crate::revert_policy_version::RevertPolicyVersionHandler;
use crate::revoke_access_key::RevokeAccessKeyHandler;

/// One containment action kind's forward and reverse operations.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler serves.
    fn kind(&self) -> ActionKind;

    /// Performs the action. Must be idempotent.
    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError>;

    /// Reverses the action using its stored descriptor.
    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let _ = (target, rollback_data);
        Err(EffectorError::Permanent(format!(
            "rollback not supported for {}",
            self.kind()
        )))
    }
}

/// Registry of action handlers; the executor's pluggable effector.
pub struct EffectorRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    cloud: MockCloud,
}

impl EffectorRegistry {
    /// Creates an empty registry over a cloud backend.
    pub fn new(cloud: MockCloud) -> Self {
        Self {
            handlers: HashMap::new(),
            cloud,
        }
    }

    /// Creates a registry with every built-in handler registered.
    pub fn with_builtin_handlers(cloud: MockCloud) -> Self {
        let mut registry = Self::new(cloud.clone());
        registry.register(Arc::new(DisableLoginProfileHandler::new(cloud.clone())));
        registry.register(Arc::new(DetachUserPolicyHandler::new(cloud.clone())));
        registry.register(Arc::new(DetachRolePolicyHandler::new(cloud.clone())));
        registry.register(Arc::new(RevokeAccessKeyHandler::new(cloud.clone())));
        registry.register(Arc::new(QuarantineRoleHandler::new(cloud.clone())));
        registry.register(Arc::new(RevertPolicyVersionHandler::new(cloud.clone())));
        registry.register(Arc::new(NotifyOperatorHandler::new(cloud)));
        registry
    }

    /// Registers a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        info!(kind = %handler.kind(), "registering action handler");
        self.handlers.insert(handler.kind(), handler);
    }

    fn handler(&self, kind: ActionKind) -> Result<&Arc<dyn ActionHandler>, EffectorError> {
        self.handlers
            .get(&kind)
            .ok_or_else(|| EffectorError::Permanent(format!("no handler for action kind {kind}")))
    }
}

#[async_trait]
impl Effector for EffectorRegistry {
    #[instrument(skip(self, target), fields(kind = %kind))]
    async fn execute(
        &self,
        kind: ActionKind,
        target: &ActionTarget,
    ) -> Result<EffectorOutcome, EffectorError> {
        if self.cloud.take_injected_failure().await {
            return Err(EffectorError::Transient("simulated throttling".to_string()));
        }
        self.handler(kind)?.execute(target).await
    }

    #[instrument(skip(self, target, rollback_data), fields(kind = %kind))]
    async fn rollback(
        &self,
        kind: ActionKind,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        self.handler(kind)?.rollback(target, rollback_data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_registry_serves_every_kind() {
        let cloud = MockCloud::new();
        cloud.seed_user("user:a").await;
        cloud.seed_role("role:r", &[]).await;
        cloud.seed_policy("policy:p", &["v1", "v2"]).await;
        let registry = EffectorRegistry::with_builtin_handlers(cloud);

        for (kind, target) in [
            (
                ActionKind::DisableLoginProfile,
                ActionTarget::Principal {
                    id: "user:a".to_string(),
                },
            ),
            (
                ActionKind::QuarantineRole,
                ActionTarget::Principal {
                    id: "role:r".to_string(),
                },
            ),
            (
                ActionKind::NotifyOperator,
                ActionTarget::Alert {
                    alert_id: "alert-1".to_string(),
                },
            ),
        ] {
            let outcome = registry.execute(kind, &target).await.unwrap();
            assert!(!outcome.result.is_empty());
        }
    }

    #[tokio::test]
    async fn test_injected_failure_surfaces_as_transient() {
        let cloud = MockCloud::new();
        cloud.seed_role("role:r", &[]).await;
        cloud.inject_transient_failures(1).await;
        let registry = EffectorRegistry::with_builtin_handlers(cloud);

        let target = ActionTarget::Principal {
            id: "role:r".to_string(),
        };
        let first = registry.execute(ActionKind::QuarantineRole, &target).await;
        assert!(matches!(first, Err(EffectorError::Transient(_))));

        let second = registry.execute(ActionKind::QuarantineRole, &target).await;
        assert!(second.is_ok());
    }
}
