//! Detach policy actions.
//!
//! Removes a managed policy attachment from a user or role. Rollback
//! reattaches the policy recorded in the descriptor.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

fn principal_policy(target: &ActionTarget) -> Result<(&str, &str), EffectorError> {
    match target {
        ActionTarget::PrincipalPolicy { principal, policy } => Ok((principal, policy)),
        other => Err(EffectorError::Permanent(format!(
            "detach expects a (principal, policy) target, got {other}"
        ))),
    }
}

/// Handler for [`ActionKind::DetachUserPolicy`].
pub struct DetachUserPolicyHandler {
    cloud: MockCloud,
}

impl DetachUserPolicyHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for DetachUserPolicyHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::DetachUserPolicy
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let (principal, policy) = principal_policy(target)?;
        let was_attached = self
            .cloud
            .with_user(principal, |user| user.attached_policies.remove(policy))
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown user: {principal}")))?;

        info!(user = %principal, policy = %policy, was_attached, "user policy detached");
        let message = if was_attached {
            format!("detached {policy} from {principal}")
        } else {
            format!("{policy} was not attached to {principal}")
        };
        Ok(EffectorOutcome::new(message).with_rollback(serde_json::json!({
            "principal": principal,
            "policy": policy,
            "was_attached": was_attached,
        })))
    }

    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let (principal, policy) = principal_policy(target)?;
        if !rollback_data["was_attached"].as_bool().unwrap_or(true) {
            return Ok(EffectorOutcome::new(format!(
                "{policy} was never attached to {principal}; nothing to restore"
            )));
        }
        self.cloud
            .with_user(principal, |user| {
                user.attached_policies.insert(policy.to_string())
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown user: {principal}")))?;
        Ok(EffectorOutcome::new(format!(
            "reattached {policy} to {principal}"
        )))
    }
}

/// Handler for [`ActionKind::DetachRolePolicy`].
pub struct DetachRolePolicyHandler {
    cloud: MockCloud,
}

impl DetachRolePolicyHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for DetachRolePolicyHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::DetachRolePolicy
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let (principal, policy) = principal_policy(target)?;
        let was_attached = self
            .cloud
            .with_role(principal, |role| role.attached_policies.remove(policy))
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown role: {principal}")))?;

        info!(role = %principal, policy = %policy, was_attached, "role policy detached");
        let message = if was_attached {
            format!("detached {policy} from {principal}")
        } else {
            format!("{policy} was not attached to {principal}")
        };
        Ok(EffectorOutcome::new(message).with_rollback(serde_json::json!({
            "principal": principal,
            "policy": policy,
            "was_attached": was_attached,
        })))
    }

    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let (principal, policy) = principal_policy(target)?;
        if !rollback_data["was_attached"].as_bool().unwrap_or(true) {
            return Ok(EffectorOutcome::new(format!(
                "{policy} was never attached to {principal}; nothing to restore"
            )));
        }
        self.cloud
            .with_role(principal, |role| {
                role.attached_policies.insert(policy.to_string())
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown role: {principal}")))?;
        Ok(EffectorOutcome::new(format!(
            "reattached {policy} to {principal}"
        )))
    }
}
