//! Quarantine role action.
//!
//! Attaches the deny-all quarantine policy to a role, freezing it without
//! destroying its configuration. Rollback detaches the quarantine policy
//! unless the role was already quarantined before the action ran.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

/// Handler for [`ActionKind::QuarantineRole`].
pub struct QuarantineRoleHandler {
    cloud: MockCloud,
}

impl QuarantineRoleHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for QuarantineRoleHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::QuarantineRole
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Principal { id } = target else {
            return Err(EffectorError::Permanent(format!(
                "quarantine_role expects a principal target, got {target}"
            )));
        };

        let was_quarantined = self
            .cloud
            .with_role(id, |role| {
                let was = role.quarantined;
                role.quarantined = true;
                was
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown role: {id}")))?;

        info!(role = %id, was_quarantined, "role quarantined");
        let message = if was_quarantined {
            format!("{id} was already quarantined")
        } else {
            format!("quarantine policy attached to {id} (deny-all)")
        };
        Ok(EffectorOutcome::new(message).with_rollback(serde_json::json!({
            "role": id,
            "was_quarantined": was_quarantined,
        })))
    }

    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Principal { id } = target else {
            return Err(EffectorError::Permanent(format!(
                "quarantine_role expects a principal target, got {target}"
            )));
        };
        if rollback_data["was_quarantined"].as_bool().unwrap_or(false) {
            return Ok(EffectorOutcome::new(format!(
                "{id} was quarantined before the action; leaving in place"
            )));
        }
        self.cloud
            .with_role(id, |role| role.quarantined = false)
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown role: {id}")))?;
        Ok(EffectorOutcome::new(format!(
            "quarantine policy detached from {id}"
        )))
    }
}
