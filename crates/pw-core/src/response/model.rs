//! Response data models: actions, plans, and their state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the executor's persisted state inside the data directory.
pub const RESPONSE_STATE_FILE: &str = "response_state.json";

/// Kinds of containment actions the planner can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Delete the user's console login profile.
    DisableLoginProfile,
    /// Detach a managed policy from a user.
    DetachUserPolicy,
    /// Detach a managed policy from a role.
    DetachRolePolicy,
    /// Deactivate a user's access keys.
    RevokeAccessKey,
    /// Attach a deny-all quarantine policy to a role.
    QuarantineRole,
    /// Restore a policy's previous default version.
    RevertPolicyVersion,
    /// Notify the on-call operator about the alert.
    NotifyOperator,
}

impl ActionKind {
    /// Whether an action of this kind can be undone from its rollback
    /// descriptor. Deleting a login profile discards the password and a
    /// notification cannot be unsent; everything else restores cleanly.
    pub fn reversible(&self) -> bool {
        !matches!(
            self,
            ActionKind::DisableLoginProfile | ActionKind::NotifyOperator
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::DisableLoginProfile => write!(f, "disable_login_profile"),
            ActionKind::DetachUserPolicy => write!(f, "detach_user_policy"),
            ActionKind::DetachRolePolicy => write!(f, "detach_role_policy"),
            ActionKind::RevokeAccessKey => write!(f, "revoke_access_key"),
            ActionKind::QuarantineRole => write!(f, "quarantine_role"),
            ActionKind::RevertPolicyVersion => write!(f, "revert_policy_version"),
            ActionKind::NotifyOperator => write!(f, "notify_operator"),
        }
    }
}

/// Target of an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTarget {
    /// A single principal (user or role).
    Principal { id: String },
    /// A (principal, policy) attachment.
    PrincipalPolicy { principal: String, policy: String },
    /// A policy plus the version to restore.
    PolicyVersion {
        policy: String,
        prior_version: Option<String>,
    },
    /// The alert an operator notification refers to.
    Alert { alert_id: String },
}

impl std::fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionTarget::Principal { id } => write!(f, "{}", id),
            ActionTarget::PrincipalPolicy { principal, policy } => {
                write!(f, "{}/{}", principal, policy)
            }
            ActionTarget::PolicyVersion {
                policy,
                prior_version,
            } => match prior_version {
                Some(version) => write!(f, "{}@{}", policy, version),
                None => write!(f, "{}", policy),
            },
            ActionTarget::Alert { alert_id } => write!(f, "alert:{}", alert_id),
        }
    }
}

/// Lifecycle of a single action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Synthesized, not yet run.
    Planned,
    /// Effector call in flight.
    Executing,
    /// Effector reported success.
    Completed,
    /// Effector failed (after retries) or the deadline expired.
    Failed,
    /// Successfully undone via the rollback descriptor.
    RolledBack,
}

/// A single containment action inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Stable identifier, `RA-000001` style.
    pub id: String,
    /// What the action does.
    pub kind: ActionKind,
    /// What it does it to.
    pub target: ActionTarget,
    /// Current status.
    pub status: ActionStatus,
    /// When the effector call completed (success or failure).
    pub executed_at: Option<DateTime<Utc>>,
    /// Effector result string.
    pub result: Option<String>,
    /// Whether the action can be rolled back.
    pub reversible: bool,
    /// Kind-specific state captured on success, consumed by rollback.
    pub rollback_data: Option<serde_json::Value>,
}

impl Action {
    /// Creates a freshly planned action.
    pub fn planned(id: String, kind: ActionKind, target: ActionTarget) -> Self {
        Self {
            id,
            kind,
            target,
            status: ActionStatus::Planned,
            executed_at: None,
            result: None,
            reversible: kind.reversible(),
            rollback_data: None,
        }
    }
}

/// Lifecycle of a response plan.
///
/// ```text
/// pending_approval --approve--> approved --execute--> executing --ok--> completed
/// pending_approval --reject-->  rejected
/// approved --execute--> executing --any fail--> failed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    PendingApproval,
    Approved,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanState::PendingApproval => write!(f, "pending_approval"),
            PlanState::Approved => write!(f, "approved"),
            PlanState::Rejected => write!(f, "rejected"),
            PlanState::Executing => write!(f, "executing"),
            PlanState::Completed => write!(f, "completed"),
            PlanState::Failed => write!(f, "failed"),
        }
    }
}

/// An ordered, stateful bundle of actions synthesized from one alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Stable identifier, `RP-000001` style.
    pub id: String,
    /// The alert this plan responds to.
    pub alert_id: String,
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// Whether the approval gate passed automatically.
    pub auto_approved: bool,
    /// Whether a human approved the plan.
    pub human_approved: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Current state.
    pub state: PlanState,
}
