//! Revert policy version action.
//!
//! Restores a policy's default version to the known-good prior version,
//! undoing a `CreatePolicyVersion`/`SetDefaultPolicyVersion` escalation.
//! The descriptor records the version that was displaced so rollback can
//! restore it.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

/// Handler for [`ActionKind::RevertPolicyVersion`].
pub struct RevertPolicyVersionHandler {
    cloud: MockCloud,
}

impl RevertPolicyVersionHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for RevertPolicyVersionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RevertPolicyVersion
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::PolicyVersion {
            policy,
            prior_version,
        } = target
        else {
            return Err(EffectorError::Permanent(format!(
                "revert_policy_version expects a policy version target, got {target}"
            )));
        };
        let Some(prior) = prior_version else {
            return Err(EffectorError::Permanent(format!(
                "no prior version recorded for {policy}"
            )));
        };

        let displaced = self
            .cloud
            .with_policy(policy, |record| {
                if !record.versions.contains(prior) {
                    return Err(EffectorError::Permanent(format!(
                        "{policy} has no version {prior}"
                    )));
                }
                let displaced = record.default_version.clone();
                record.default_version = prior.clone();
                Ok(displaced)
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown policy: {policy}")))??;

        info!(policy = %policy, restored = %prior, displaced = %displaced, "policy version reverted");
        let message = if &displaced == prior {
            format!("{policy} default version already {prior}")
        } else {
            format!("{policy} default version set to {prior} (was {displaced})")
        };
        Ok(EffectorOutcome::new(message).with_rollback(serde_json::json!({
            "policy": policy,
            "displaced_version": displaced,
        })))
    }

    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::PolicyVersion { policy, .. } = target else {
            return Err(EffectorError::Permanent(format!(
                "revert_policy_version expects a policy version target, got {target}"
            )));
        };
        let Some(displaced) = rollback_data["displaced_version"].as_str() else {
            return Err(EffectorError::Permanent(
                "rollback descriptor missing displaced_version".to_string(),
            ));
        };

        self.cloud
            .with_policy(policy, |record| {
                record.default_version = displaced.to_string();
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown policy: {policy}")))?;
        Ok(EffectorOutcome::new(format!(
            "{policy} default version restored to {displaced}"
        )))
    }
}
