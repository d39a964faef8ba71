//! Disable login profile action.
//!
//! Deletes the user's console login profile, cutting off password access.
//! There is no way to restore the original password, so the action is not
//! reversible; rollback is refused by the handler.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

/// Handler for [`ActionKind::DisableLoginProfile`].
pub struct DisableLoginProfileHandler {
    cloud: MockCloud,
}

impl DisableLoginProfileHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for DisableLoginProfileHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::DisableLoginProfile
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Principal { id } = target else {
            return Err(EffectorError::Permanent(format!(
                "disable_login_profile expects a principal target, got {target}"
            )));
        };

        let had_profile = self
            .cloud
            .with_user(id, |user| {
                let had = user.login_profile;
                user.login_profile = false;
                had
            })
            .await
            .ok_or_else(|| EffectorError::Permanent(format!("unknown user: {id}")))?;

        info!(user = %id, had_profile, "login profile disabled");
        let message = if had_profile {
            format!("console login profile deleted for {id}")
        } else {
            // Idempotent: repeating the call is a no-op success.
            format!("{id} has no login profile")
        };
        Ok(EffectorOutcome::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disables_and_is_idempotent() {
        let cloud = MockCloud::new();
        cloud.seed_user("user:intern_a").await;
        let handler = DisableLoginProfileHandler::new(cloud.clone());
        let target = ActionTarget::Principal {
            id: "user:intern_a".to_string(),
        };

        let first = handler.execute(&target).await.unwrap();
        assert!(first.result.contains("deleted"));
        assert!(!cloud.user("user:intern_a").await.unwrap().login_profile);

        let second = handler.execute(&target).await.unwrap();
        assert!(second.result.contains("no login profile"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_permanent_error() {
        let handler = DisableLoginProfileHandler::new(MockCloud::new());
        let target = ActionTarget::Principal {
            id: "user:ghost".to_string(),
        };
        let result = handler.execute(&target).await;
        assert!(matches!(result, Err(EffectorError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_rollback_refused() {
        let handler = DisableLoginProfileHandler::new(MockCloud::new());
        let target = ActionTarget::Principal {
            id: "user:intern_a".to_string(),
        };
        let result = handler.rollback(&target, &serde_json::Value::Null).await;
        assert!(matches!(result, Err(EffectorError::Permanent(_))));
    }
}
