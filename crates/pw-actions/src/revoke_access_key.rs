//! Revoke access key action.
//!
//! Deactivates every active access key on a user. The descriptor records
//! which keys were deactivated so rollback reactivates exactly those.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

/// Handler for [`ActionKind::RevokeAccessKey`].
pub struct RevokeAccessKeyHandler {
    cloud: MockCloud,
}

impl RevokeAccessKeyHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for RevokeAccessKeyHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RevokeAccessKey
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Principal { id } = target else {
            return Err(EffectorError::Permanent(format!(
                "revoke_access_key expects a principal target, got {target}"
            )));
        };

        let deactivated = self
            .cloud
            .with_user(id, |user| {
                let mut deactivated = Vec::new();
                for (key_id, active) in user.access_keys.iter_mut() {
                    if *active {
                        *active = false;
                        deactivated.push(key_id.clone());
                    }
                }
                deactivated
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown user: {id}")))?;

        info!(user = %id, count = deactivated.len(), "access keys deactivated");
        let message = if deactivated.is_empty() {
            format!("no active access keys on {id}")
        } else {
            format!("deactivated keys for {id}: {}", deactivated.join(", "))
        };
        Ok(EffectorOutcome::new(message).with_rollback(serde_json::json!({
            "user": id,
            "deactivated_keys": deactivated,
        })))
    }

    async fn rollback(
        &self,
        target: &ActionTarget,
        rollback_data: &serde_json::Value,
    ) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Principal { id } = target else {
            return Err(EffectorError::Permanent(format!(
                "revoke_access_key expects a principal target, got {target}"
            )));
        };
        let keys: Vec<String> = rollback_data["deactivated_keys"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        self.cloud
            .with_user(id, |user| {
                for key in &keys {
                    if let Some(active) = user.access_keys.get_mut(key) {
                        *active = true;
                    }
                }
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown user: {id}")))?;

        Ok(EffectorOutcome::new(format!(
            "reactivated {} key(s) for {id}",
            keys.len()
        )))
    }
}
