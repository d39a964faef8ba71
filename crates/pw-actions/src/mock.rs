//! In-memory mock cloud backend.
//!
//! Simulates the slice of an IAM account the handlers touch: users with
//! login profiles and access keys, roles with policy attachments and a
//! quarantine flag, and policies with versions. State survives repeated
//! identical calls unchanged, which is what gives the handlers their
//! idempotency guarantee. Transient-failure injection drives the
//! executor's retry tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A simulated IAM user.
#[derive(Debug, Clone, Default)]
pub struct MockUser {
    /// Whether the user has a console login profile.
    pub login_profile: bool,
    /// Access key id -> active flag.
    pub access_keys: BTreeMap<String, bool>,
    /// Attached managed policies.
    pub attached_policies: BTreeSet<String>,
}

/// A simulated IAM role.
#[derive(Debug, Clone, Default)]
pub struct MockRole {
    /// Attached managed policies.
    pub attached_policies: BTreeSet<String>,
    /// Whether the deny-all quarantine policy is attached.
    pub quarantined: bool,
}

/// A simulated managed policy with versions.
#[derive(Debug, Clone, Default)]
pub struct MockPolicy {
    /// Known version labels.
    pub versions: BTreeSet<String>,
    /// Current default version.
    pub default_version: String,
}

#[derive(Debug, Default)]
struct MockCloudState {
    users: BTreeMap<String, MockUser>,
    roles: BTreeMap<String, MockRole>,
    policies: BTreeMap<String, MockPolicy>,
    notifications: Vec<String>,
    transient_failures: usize,
}

/// Shared handle to the simulated account.
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<Mutex<MockCloudState>>,
}

impl MockCloud {
    /// Creates an empty account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user with a login profile and one active access key.
    pub async fn seed_user(&self, id: &str) {
        let mut state = self.state.lock().await;
        let mut user = MockUser {
            login_profile: true,
            ..Default::default()
        };
        user.access_keys.insert(format!("AKIA{}", id.len()), true);
        state.users.insert(id.to_string(), user);
    }

    /// Seeds a role.
    pub async fn seed_role(&self, id: &str, policies: &[&str]) {
        let mut state = self.state.lock().await;
        state.roles.insert(
            id.to_string(),
            MockRole {
                attached_policies: policies.iter().map(|p| p.to_string()).collect(),
                quarantined: false,
            },
        );
    }

    /// Seeds a policy with versions; the last one is the default.
    pub async fn seed_policy(&self, id: &str, versions: &[&str]) {
        let mut state = self.state.lock().await;
        state.policies.insert(
            id.to_string(),
            MockPolicy {
                versions: versions.iter().map(|v| v.to_string()).collect(),
                default_version: versions.last().unwrap_or(&"v1").to_string(),
            },
        );
    }

    /// Attaches a policy to a user (seeding helper).
    pub async fn attach_user_policy(&self, user: &str, policy: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.users.get_mut(user) {
            record.attached_policies.insert(policy.to_string());
        }
    }

    /// Makes the next `n` handler calls fail with a transient error.
    pub async fn inject_transient_failures(&self, n: usize) {
        self.state.lock().await.transient_failures = n;
    }

    /// Consumes one injected failure if armed. Handlers call this at the
    /// top of every operation.
    pub(crate) async fn take_injected_failure(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) async fn with_user<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut MockUser) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock().await;
        state.users.get_mut(id).map(f)
    }

    pub(crate) async fn with_role<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut MockRole) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock().await;
        state.roles.get_mut(id).map(f)
    }

    pub(crate) async fn with_policy<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut MockPolicy) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock().await;
        state.policies.get_mut(id).map(f)
    }

    pub(crate) async fn record_notification(&self, message: String) {
        self.state.lock().await.notifications.push(message);
    }

    /// Snapshot of a user (assertions).
    pub async fn user(&self, id: &str) -> Option<MockUser> {
        self.state.lock().await.users.get(id).cloned()
    }

    /// Snapshot of a role (assertions).
    pub async fn role(&self, id: &str) -> Option<MockRole> {
        self.state.lock().await.roles.get(id).cloned()
    }

    /// Snapshot of a policy (assertions).
    pub async fn policy(&self, id: &str) -> Option<MockPolicy> {
        self.state.lock().await.policies.get(id).cloned()
    }

    /// Operator notifications sent so far (assertions).
    pub async fn notifications(&self) -> Vec<String> {
        self.state.lock().await.notifications.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeding_and_snapshots() {
        let cloud = MockCloud::new();
        cloud.seed_user("user:intern_a").await;
        cloud.seed_role("role:maintenance", &["policy:base"]).await;
        cloud.seed_policy("policy:ds_custom", &["v1", "v2", "v3"]).await;

        let user = cloud.user("user:intern_a").await.unwrap();
        assert!(user.login_profile);
        assert_eq!(user.access_keys.len(), 1);

        let role = cloud.role("role:maintenance").await.unwrap();
        assert!(role.attached_policies.contains("policy:base"));
        assert!(!role.quarantined);

        let policy = cloud.policy("policy:ds_custom").await.unwrap();
        assert_eq!(policy.default_version, "v3");
    }

    #[tokio::test]
    async fn test_failure_injection_is_consumed() {
        let cloud = MockCloud::new();
        cloud.inject_transient_failures(2).await;
        assert!(cloud.take_injected_failure().await);
        assert!(cloud.take_injected_failure().await);
        assert!(!cloud.take_injected_failure().await);
    }
}
