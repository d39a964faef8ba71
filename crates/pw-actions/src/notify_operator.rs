//! Notify operator action.
//!
//! Sends the on-call operator a notification referencing the alert. A
//! notification cannot be unsent, so the action is not reversible.

use crate::mock::MockCloud;
use crate::registry::ActionHandler;
use async_trait::async_trait;
use pw_core::{ActionKind, ActionTarget, EffectorError, EffectorOutcome};
use tracing::info;

/// Handler for [`ActionKind::NotifyOperator`].
pub struct NotifyOperatorHandler {
    cloud: MockCloud,
}

impl NotifyOperatorHandler {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl ActionHandler for NotifyOperatorHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::NotifyOperator
    }

    async fn execute(&self, target: &ActionTarget) -> Result<EffectorOutcome, EffectorError> {
        let ActionTarget::Alert { alert_id } = target else {
            return Err(EffectorError::Permanent(format!(
                "notify_operator expects an alert target, got {target}"
            )));
        };

        let message = format!("escalation alert {alert_id} requires operator attention");
        self.cloud.record_notification(message.clone()).await;
        info!(alert_id = %alert_id, "operator notified");
        Ok(EffectorOutcome::new(format!(
            "operator notified about alert {alert_id}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notification_recorded() {
        let cloud = MockCloud::new();
        let handler = NotifyOperatorHandler::new(cloud.clone());
        let target = ActionTarget::Alert {
            alert_id: "abc123".to_string(),
        };

        handler.execute(&target).await.unwrap();
        handler.execute(&target).await.unwrap();

        let notifications = cloud.notifications().await;
        assert_eq!(notifications.len(), 2);
        assert!(notifications[0].contains("abc123"));
    }

    #[tokio::test]
    async fn test_rollback_refused() {
        let handler = NotifyOperatorHandler::new(MockCloud::new());
        let target = ActionTarget::Alert {
            alert_id: "abc123".to_string(),
        };
        let result = handler.rollback(&target, &serde_json::Value::Null).await;
        assert!(matches!(result, Err(EffectorError::Permanent(_))));
    }
}
