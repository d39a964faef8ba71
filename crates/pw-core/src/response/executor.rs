//! Response plan execution.
//!
//! Owns every plan's state machine. Actions within a plan run strictly in
//! order with at most one in flight; distinct plans may execute
//! concurrently. Transient effector failures are retried with exponential
//! backoff, execution carries a plan-level deadline, and the full response
//! state is persisted after every transition.

use crate::detection::Alert;
use crate::graph::IdentityGraph;
use crate::persist::{self, PersistError};
use crate::response::effector::{Effector, EffectorError, EffectorOutcome};
use crate::response::model::{
    Action, ActionKind, ActionStatus, ActionTarget, Plan, PlanState, RESPONSE_STATE_FILE,
};
use crate::response::planner;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use pw_observability::AuditLog;

/// Wall-clock deadline for executing one plan.
pub const DEFAULT_PLAN_DEADLINE: Duration = Duration::from_secs(60);

/// Backoff schedule for transient effector failures; the schedule length is
/// the retry limit.
pub const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(400),
    Duration::from_millis(1600),
];

/// Errors from the response engine.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("plan {plan} cannot be {operation} from state {from}")]
    InvalidTransition {
        plan: String,
        from: PlanState,
        operation: &'static str,
    },

    #[error("action {0} is not reversible")]
    NotReversible(String),

    #[error("action {action} cannot be rolled back from status {status:?}")]
    NotRollbackable {
        action: String,
        status: ActionStatus,
    },

    #[error(transparent)]
    Effector(#[from] EffectorError),
}

/// Persisted state: plans plus the id counters.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EngineState {
    plans: BTreeMap<String, Plan>,
    plan_counter: u64,
    action_counter: u64,
}

/// Creates plans from alerts and drives them through execution/rollback.
pub struct ResponseEngine {
    state: RwLock<EngineState>,
    plan_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    cancels: std::sync::Mutex<HashMap<String, watch::Sender<bool>>>,
    effector: Arc<dyn Effector>,
    audit: Arc<AuditLog>,
    path: Option<PathBuf>,
    deadline: Duration,
}

impl ResponseEngine {
    /// Creates an engine with no disk persistence (tests).
    pub fn in_memory(effector: Arc<dyn Effector>, audit: Arc<AuditLog>) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            plan_locks: Mutex::new(HashMap::new()),
            cancels: std::sync::Mutex::new(HashMap::new()),
            effector,
            audit,
            path: None,
            deadline: DEFAULT_PLAN_DEADLINE,
        }
    }

    /// Opens the engine backed by `response_state.json` under `data_dir`.
    /// A corrupt file is recoverable: the engine starts empty and the error
    /// is returned for the caller to audit as `persistence_load_failed`.
    pub fn open(
        data_dir: &Path,
        effector: Arc<dyn Effector>,
        audit: Arc<AuditLog>,
    ) -> (Self, Option<PersistError>) {
        let path = data_dir.join(RESPONSE_STATE_FILE);
        let (state, load_error) = match persist::load_json::<EngineState>(&path) {
            Ok(Some(state)) => (state, None),
            Ok(None) => (EngineState::default(), None),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "response state unreadable, starting empty");
                (EngineState::default(), Some(err))
            }
        };
        (
            Self {
                state: RwLock::new(state),
                plan_locks: Mutex::new(HashMap::new()),
                cancels: std::sync::Mutex::new(HashMap::new()),
                effector,
                audit,
                path: Some(path),
                deadline: DEFAULT_PLAN_DEADLINE,
            },
            load_error,
        )
    }

    /// Overrides the plan execution deadline (tests).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Synthesizes a plan for an alert, applies the approval gate, stores
    /// it, and audits its creation.
    pub async fn create_plan(&self, alert: &Alert, graph: &IdentityGraph) -> Plan {
        let plan = {
            let mut state = self.state.write().await;
            state.plan_counter += 1;
            let plan_id = format!("RP-{:06}", state.plan_counter);

            let mut action_counter = state.action_counter;
            let actions = planner::build_actions(alert, graph, || {
                action_counter += 1;
                format!("RA-{action_counter:06}")
            });
            state.action_counter = action_counter;

            let plan = Plan {
                id: plan_id.clone(),
                alert_id: alert.id.clone(),
                actions,
                auto_approved: alert.auto_response_eligible,
                human_approved: false,
                created_at: Utc::now(),
                state: if alert.auto_response_eligible {
                    PlanState::Approved
                } else {
                    PlanState::PendingApproval
                },
            };
            state.plans.insert(plan_id, plan.clone());
            plan
        };

        let detail = format!(
            "alert {} severity gate: auto_approved={}",
            alert.id, plan.auto_approved
        );
        self.audit
            .append(
                "plan_created",
                "system",
                Some(&plan.id),
                "success",
                Some(&detail),
            )
            .await;
        self.persist_state().await;
        info!(plan_id = %plan.id, auto_approved = plan.auto_approved, "plan created");
        plan
    }

    /// Human approval: `pending_approval -> approved`.
    pub async fn approve(&self, plan_id: &str, actor: &str) -> Result<Plan, ResponseError> {
        let plan = {
            let mut state = self.state.write().await;
            let plan = state
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| ResponseError::PlanNotFound(plan_id.to_string()))?;
            if plan.state != PlanState::PendingApproval {
                return Err(ResponseError::InvalidTransition {
                    plan: plan_id.to_string(),
                    from: plan.state,
                    operation: "approved",
                });
            }
            plan.human_approved = true;
            plan.state = PlanState::Approved;
            plan.clone()
        };
        self.audit
            .append("plan_approved", actor, Some(plan_id), "success", None)
            .await;
        self.persist_state().await;
        Ok(plan)
    }

    /// Human rejection: `pending_approval -> rejected`.
    pub async fn reject(
        &self,
        plan_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<Plan, ResponseError> {
        let plan = {
            let mut state = self.state.write().await;
            let plan = state
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| ResponseError::PlanNotFound(plan_id.to_string()))?;
            if plan.state != PlanState::PendingApproval {
                return Err(ResponseError::InvalidTransition {
                    plan: plan_id.to_string(),
                    from: plan.state,
                    operation: "rejected",
                });
            }
            plan.state = PlanState::Rejected;
            plan.clone()
        };
        self.audit
            .append("plan_rejected", actor, Some(plan_id), "success", Some(reason))
            .await;
        self.persist_state().await;
        Ok(plan)
    }

    /// Executes an approved plan, or re-runs a completed one, or restarts a
    /// failed one from its first action. Actions run strictly in order; the
    /// first failure halts the plan.
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn execute(&self, plan_id: &str, actor: &str) -> Result<Plan, ResponseError> {
        let plan_lock = self.plan_lock(plan_id).await;
        let _guard = plan_lock.lock().await;

        let total = {
            let mut state = self.state.write().await;
            let plan = state
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| ResponseError::PlanNotFound(plan_id.to_string()))?;
            match plan.state {
                PlanState::Approved | PlanState::Completed | PlanState::Failed => {}
                _ => {
                    return Err(ResponseError::InvalidTransition {
                        plan: plan_id.to_string(),
                        from: plan.state,
                        operation: "executed",
                    })
                }
            }
            plan.state = PlanState::Executing;
            plan.actions.len()
        };
        self.persist_state().await;

        let mut cancel_rx = self.register_cancel(plan_id);
        let deadline = Instant::now() + self.deadline;

        for index in 0..total {
            let (action_id, kind, target) = {
                let mut state = self.state.write().await;
                let plan = state
                    .plans
                    .get_mut(plan_id)
                    .ok_or_else(|| ResponseError::PlanNotFound(plan_id.to_string()))?;
                let action = &mut plan.actions[index];
                action.status = ActionStatus::Executing;
                (action.id.clone(), action.kind, action.target.clone())
            };
            self.persist_state().await;

            match self
                .run_with_retries(kind, &target, deadline, &mut cancel_rx)
                .await
            {
                Ok((outcome, retries)) => {
                    let result = if retries > 0 {
                        format!("{} (after {} retries)", outcome.result, retries)
                    } else {
                        outcome.result.clone()
                    };
                    self.finish_action(plan_id, index, ActionStatus::Completed, &result, outcome)
                        .await;
                    self.audit
                        .append(
                            "action_executed",
                            actor,
                            Some(&action_id),
                            "success",
                            Some(&result),
                        )
                        .await;
                }
                Err(message) => {
                    self.finish_action(
                        plan_id,
                        index,
                        ActionStatus::Failed,
                        &message,
                        EffectorOutcome::new(""),
                    )
                    .await;
                    self.audit
                        .append(
                            "action_failed",
                            actor,
                            Some(&action_id),
                            "failure",
                            Some(&message),
                        )
                        .await;

                    let plan = self.set_plan_state(plan_id, PlanState::Failed).await?;
                    self.audit
                        .append("plan_failed", actor, Some(plan_id), "failure", Some(&message))
                        .await;
                    self.remove_cancel(plan_id);
                    return Ok(plan);
                }
            }
        }

        let plan = self.set_plan_state(plan_id, PlanState::Completed).await?;
        self.audit
            .append("plan_executed", actor, Some(plan_id), "success", None)
            .await;
        self.remove_cancel(plan_id);
        Ok(plan)
    }

    /// Signals the per-plan cancellation; the in-flight effector call is
    /// abandoned and the plan halts as failed.
    pub fn request_cancel(&self, plan_id: &str) {
        let cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = cancels.get(plan_id) {
            let _ = tx.send(true);
        }
    }

    /// Rolls back one completed, reversible action via the effector's
    /// reverse operation. The owning plan's state is unchanged.
    #[instrument(skip(self), fields(action_id = %action_id))]
    pub async fn rollback(&self, action_id: &str, actor: &str) -> Result<Action, ResponseError> {
        let (plan_id, index, kind, target, descriptor) = {
            let state = self.state.read().await;
            let mut found = None;
            'outer: for (plan_id, plan) in &state.plans {
                for (index, action) in plan.actions.iter().enumerate() {
                    if action.id == action_id {
                        if !action.reversible {
                            return Err(ResponseError::NotReversible(action_id.to_string()));
                        }
                        if action.status != ActionStatus::Completed {
                            return Err(ResponseError::NotRollbackable {
                                action: action_id.to_string(),
                                status: action.status,
                            });
                        }
                        found = Some((
                            plan_id.clone(),
                            index,
                            action.kind,
                            action.target.clone(),
                            action.rollback_data.clone().unwrap_or(serde_json::Value::Null),
                        ));
                        break 'outer;
                    }
                }
            }
            found.ok_or_else(|| ResponseError::ActionNotFound(action_id.to_string()))?
        };

        let deadline = Instant::now() + self.deadline;
        let mut retries = 0usize;
        let outcome = loop {
            match self.effector.rollback(kind, &target, &descriptor).await {
                Ok(outcome) => break outcome,
                Err(err) if err.is_transient() && retries < RETRY_BACKOFF.len() => {
                    let backoff = RETRY_BACKOFF[retries];
                    retries += 1;
                    if Instant::now() + backoff >= deadline {
                        self.audit
                            .append(
                                "action_rollback_failed",
                                actor,
                                Some(action_id),
                                "failure",
                                Some(&err.to_string()),
                            )
                            .await;
                        return Err(err.into());
                    }
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    self.audit
                        .append(
                            "action_rollback_failed",
                            actor,
                            Some(action_id),
                            "failure",
                            Some(&err.to_string()),
                        )
                        .await;
                    return Err(err.into());
                }
            }
        };

        let action = {
            let mut state = self.state.write().await;
            let plan = state
                .plans
                .get_mut(&plan_id)
                .ok_or_else(|| ResponseError::PlanNotFound(plan_id.clone()))?;
            let action = &mut plan.actions[index];
            action.status = ActionStatus::RolledBack;
            action.result = Some(outcome.result.clone());
            action.clone()
        };
        self.audit
            .append(
                "action_rolled_back",
                actor,
                Some(action_id),
                "success",
                Some(&outcome.result),
            )
            .await;
        self.persist_state().await;
        Ok(action)
    }

    /// Plans awaiting human approval, in id order.
    pub async fn pending(&self) -> Vec<Plan> {
        self.plans_in_states(&[PlanState::PendingApproval]).await
    }

    /// Terminal plans (completed, failed, rejected), in id order.
    pub async fn history(&self) -> Vec<Plan> {
        self.plans_in_states(&[PlanState::Completed, PlanState::Failed, PlanState::Rejected])
            .await
    }

    /// All plans, in id order.
    pub async fn all(&self) -> Vec<Plan> {
        self.state.read().await.plans.values().cloned().collect()
    }

    /// Looks up one plan.
    pub async fn get(&self, plan_id: &str) -> Option<Plan> {
        self.state.read().await.plans.get(plan_id).cloned()
    }

    async fn plans_in_states(&self, states: &[PlanState]) -> Vec<Plan> {
        self.state
            .read()
            .await
            .plans
            .values()
            .filter(|p| states.contains(&p.state))
            .cloned()
            .collect()
    }

    async fn plan_lock(&self, plan_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.plan_locks.lock().await;
        locks
            .entry(plan_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn register_cancel(&self, plan_id: &str) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let mut cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        cancels.insert(plan_id.to_string(), tx);
        rx
    }

    fn remove_cancel(&self, plan_id: &str) {
        let mut cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        cancels.remove(plan_id);
    }

    /// Invokes the effector with the retry policy, bounded by the plan
    /// deadline and the cancellation signal. Returns the outcome and how
    /// many retries it took, or a failure message.
    async fn run_with_retries(
        &self,
        kind: ActionKind,
        target: &ActionTarget,
        deadline: Instant,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<(EffectorOutcome, usize), String> {
        let mut retries = 0usize;
        loop {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Err("plan deadline exceeded".to_string()),
            };

            let attempt = tokio::select! {
                result = tokio::time::timeout(remaining, self.effector.execute(kind, target)) => {
                    match result {
                        Ok(result) => result,
                        Err(_) => return Err("plan deadline exceeded".to_string()),
                    }
                }
                _ = cancel_rx.changed() => return Err("execution cancelled".to_string()),
            };

            match attempt {
                Ok(outcome) => return Ok((outcome, retries)),
                Err(err) if err.is_transient() && retries < RETRY_BACKOFF.len() => {
                    let backoff = RETRY_BACKOFF[retries];
                    retries += 1;
                    warn!(kind = %kind, retries, "transient effector failure, backing off: {err}");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err.to_string()),
            }
        }
    }

    async fn finish_action(
        &self,
        plan_id: &str,
        index: usize,
        status: ActionStatus,
        result: &str,
        outcome: EffectorOutcome,
    ) {
        {
            let mut state = self.state.write().await;
            if let Some(plan) = state.plans.get_mut(plan_id) {
                let action = &mut plan.actions[index];
                action.status = status;
                action.executed_at = Some(Utc::now());
                action.result = Some(result.to_string());
                if status == ActionStatus::Completed {
                    action.rollback_data = outcome.rollback_data;
                }
            }
        }
        self.persist_state().await;
    }

    async fn set_plan_state(
        &self,
        plan_id: &str,
        plan_state: PlanState,
    ) -> Result<Plan, ResponseError> {
        let plan = {
            let mut state = self.state.write().await;
            let plan = state
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| ResponseError::PlanNotFound(plan_id.to_string()))?;
            plan.state = plan_state;
            plan.clone()
        };
        self.persist_state().await;
        Ok(plan)
    }

    /// Persistence failures are logged and audited but do not fail the
    /// triggering operation; in-memory state remains authoritative.
    async fn persist_state(&self) {
        let Some(path) = &self.path else { return };
        let snapshot = {
            let state = self.state.read().await;
            EngineState {
                plans: state.plans.clone(),
                plan_counter: state.plan_counter,
                action_counter: state.action_counter,
            }
        };
        if let Err(err) = persist::write_json(path, &snapshot) {
            warn!(path = %path.display(), error = %err, "failed to persist response state");
            self.audit
                .append(
                    "persistence_write_failed",
                    "system",
                    Some(RESPONSE_STATE_FILE),
                    "failure",
                    Some(&err.to_string()),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{AttackPath, PathEdge, Severity};
    use crate::graph::{EdgeKind, Node, NodeKind};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Effector that succeeds after a configurable number of transient
    /// failures, recording every call.
    struct ScriptedEffector {
        fail_first: usize,
        calls: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    impl ScriptedEffector {
        fn succeeding() -> Self {
            Self {
                fail_first: 0,
                calls: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                fail_first: n,
                calls: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Effector for ScriptedEffector {
        async fn execute(
            &self,
            kind: ActionKind,
            target: &ActionTarget,
        ) -> Result<EffectorOutcome, EffectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(EffectorError::Transient("throttled".to_string()));
            }
            Ok(
                EffectorOutcome::new(format!("{kind} applied to {target}")).with_rollback(
                    serde_json::json!({ "kind": kind.to_string(), "target": target.to_string() }),
                ),
            )
        }

        async fn rollback(
            &self,
            kind: ActionKind,
            target: &ActionTarget,
            _rollback_data: &serde_json::Value,
        ) -> Result<EffectorOutcome, EffectorError> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(EffectorOutcome::new(format!("{kind} reverted on {target}")))
        }
    }

    /// Effector that always fails permanently.
    struct FailingEffector;

    #[async_trait]
    impl Effector for FailingEffector {
        async fn execute(
            &self,
            _kind: ActionKind,
            _target: &ActionTarget,
        ) -> Result<EffectorOutcome, EffectorError> {
            Err(EffectorError::Permanent("access denied".to_string()))
        }

        async fn rollback(
            &self,
            _kind: ActionKind,
            _target: &ActionTarget,
            _rollback_data: &serde_json::Value,
        ) -> Result<EffectorOutcome, EffectorError> {
            Err(EffectorError::Permanent("access denied".to_string()))
        }
    }

    fn test_graph() -> IdentityGraph {
        let mut g = IdentityGraph::new();
        g.upsert_node(Node::new("user:intern_a", NodeKind::User, "intern_a", 10))
            .unwrap();
        g.upsert_node(Node::new(
            "role:maintenance",
            NodeKind::Role,
            "maintenance",
            60,
        ))
        .unwrap();
        g.upsert_node(Node::new(
            "role:prod_admin",
            NodeKind::Role,
            "prod_admin",
            100,
        ))
        .unwrap();
        g.upsert_edge(
            "user:intern_a",
            "role:maintenance",
            EdgeKind::CanAssume,
            BTreeMap::new(),
        )
        .unwrap();
        g.upsert_edge(
            "role:maintenance",
            "role:prod_admin",
            EdgeKind::CanAssume,
            BTreeMap::new(),
        )
        .unwrap();
        g
    }

    fn test_alert(auto_eligible: bool) -> Alert {
        Alert {
            id: "alert-1".to_string(),
            path: AttackPath {
                nodes: vec![
                    "user:intern_a".to_string(),
                    "role:maintenance".to_string(),
                    "role:prod_admin".to_string(),
                ],
                edges: vec![
                    PathEdge {
                        kind: EdgeKind::CanAssume,
                        action: None,
                    },
                    PathEdge {
                        kind: EdgeKind::CanAssume,
                        action: None,
                    },
                ],
            },
            source_node: "user:intern_a".to_string(),
            target_node: "role:prod_admin".to_string(),
            privilege_delta: 90,
            confidence: 0.9,
            blast_radius: 2,
            severity: if auto_eligible {
                Severity::High
            } else {
                Severity::Critical
            },
            detected_at: Utc::now(),
            recommended_actions: vec![],
            auto_response_eligible: auto_eligible,
        }
    }

    fn engine_with(effector: Arc<dyn Effector>) -> ResponseEngine {
        ResponseEngine::in_memory(effector, Arc::new(AuditLog::in_memory()))
    }

    #[tokio::test]
    async fn test_create_plan_applies_approval_gate() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();

        let pending = engine.create_plan(&test_alert(false), &graph).await;
        assert_eq!(pending.state, PlanState::PendingApproval);
        assert!(!pending.auto_approved);

        let approved = engine.create_plan(&test_alert(true), &graph).await;
        assert_eq!(approved.state, PlanState::Approved);
        assert!(approved.auto_approved);
        assert!(!approved.human_approved);
    }

    #[tokio::test]
    async fn test_plan_and_action_ids_are_sequential() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();
        let first = engine.create_plan(&test_alert(false), &graph).await;
        let second = engine.create_plan(&test_alert(false), &graph).await;
        assert_eq!(first.id, "RP-000001");
        assert_eq!(second.id, "RP-000002");
        assert_eq!(first.actions[0].id, "RA-000001");
        assert!(second.actions[0].id > first.actions.last().unwrap().id);
    }

    #[tokio::test]
    async fn test_approve_then_execute_completes() {
        let effector = Arc::new(ScriptedEffector::succeeding());
        let engine = engine_with(effector.clone());
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(false), &graph).await;
        engine.approve(&plan.id, "alice").await.unwrap();
        let executed = engine.execute(&plan.id, "alice").await.unwrap();

        assert_eq!(executed.state, PlanState::Completed);
        assert!(executed
            .actions
            .iter()
            .all(|a| a.status == ActionStatus::Completed));
        assert_eq!(effector.calls.load(Ordering::SeqCst), executed.actions.len());
    }

    #[tokio::test]
    async fn test_execute_requires_approval() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();
        let plan = engine.create_plan(&test_alert(false), &graph).await;

        let result = engine.execute(&plan.id, "alice").await;
        assert!(matches!(
            result,
            Err(ResponseError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_approve_twice_is_conflict() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();
        let plan = engine.create_plan(&test_alert(false), &graph).await;
        engine.approve(&plan.id, "alice").await.unwrap();

        let result = engine.approve(&plan.id, "bob").await;
        assert!(matches!(
            result,
            Err(ResponseError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_reject_only_from_pending() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(false), &graph).await;
        let rejected = engine.reject(&plan.id, "alice", "false positive").await.unwrap();
        assert_eq!(rejected.state, PlanState::Rejected);

        let result = engine.reject(&plan.id, "alice", "again").await;
        assert!(matches!(
            result,
            Err(ResponseError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        // Fails twice with transient errors, then succeeds.
        let effector = Arc::new(ScriptedEffector::failing_first(2));
        let engine = engine_with(effector.clone());
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(true), &graph).await;
        let executed = engine.execute(&plan.id, "system").await.unwrap();

        assert_eq!(executed.actions[0].status, ActionStatus::Completed);
        let result = executed.actions[0].result.as_deref().unwrap();
        assert!(result.contains("after 2 retries"), "result: {result}");
    }

    #[tokio::test]
    async fn test_permanent_failure_halts_plan() {
        let engine = engine_with(Arc::new(FailingEffector));
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(true), &graph).await;
        let executed = engine.execute(&plan.id, "system").await.unwrap();

        assert_eq!(executed.state, PlanState::Failed);
        assert_eq!(executed.actions[0].status, ActionStatus::Failed);
        // Later actions never ran.
        assert!(executed.actions[1..]
            .iter()
            .all(|a| a.status == ActionStatus::Planned || a.status == ActionStatus::Executing));
        assert!(executed.actions[0]
            .result
            .as_deref()
            .unwrap()
            .contains("access denied"));
    }

    #[tokio::test]
    async fn test_reexecute_completed_plan_is_idempotent() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(true), &graph).await;
        let first = engine.execute(&plan.id, "system").await.unwrap();
        let second = engine.execute(&plan.id, "system").await.unwrap();

        let statuses =
            |p: &Plan| p.actions.iter().map(|a| a.status).collect::<Vec<_>>();
        assert_eq!(first.state, PlanState::Completed);
        assert_eq!(second.state, PlanState::Completed);
        assert_eq!(statuses(&first), statuses(&second));
    }

    #[tokio::test]
    async fn test_rollback_requires_completed_and_reversible() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let graph = test_graph();
        let plan = engine.create_plan(&test_alert(true), &graph).await;

        // Not yet executed: completed gate fails on a reversible action.
        let quarantine = plan
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::QuarantineRole)
            .unwrap();
        let result = engine.rollback(&quarantine.id, "alice").await;
        assert!(matches!(result, Err(ResponseError::NotRollbackable { .. })));

        engine.execute(&plan.id, "system").await.unwrap();

        // Irreversible action is refused outright.
        let disable = plan
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::DisableLoginProfile)
            .unwrap();
        let result = engine.rollback(&disable.id, "alice").await;
        assert!(matches!(result, Err(ResponseError::NotReversible(_))));

        // Reversible, completed action rolls back.
        let rolled = engine.rollback(&quarantine.id, "alice").await.unwrap();
        assert_eq!(rolled.status, ActionStatus::RolledBack);

        // Plan state is untouched by rollback.
        let plan = engine.get(&plan.id).await.unwrap();
        assert_eq!(plan.state, PlanState::Completed);
    }

    #[tokio::test]
    async fn test_rollback_of_unknown_action() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()));
        let result = engine.rollback("RA-999999", "alice").await;
        assert!(matches!(result, Err(ResponseError::ActionNotFound(_))));
    }

    #[tokio::test]
    async fn test_audit_order_for_approve_execute_rollback() {
        let audit = Arc::new(AuditLog::in_memory());
        let engine = ResponseEngine::in_memory(Arc::new(ScriptedEffector::succeeding()), audit.clone());
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(false), &graph).await;
        engine.approve(&plan.id, "alice").await.unwrap();
        engine.execute(&plan.id, "alice").await.unwrap();
        let quarantine = plan
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::QuarantineRole)
            .unwrap();
        engine.rollback(&quarantine.id, "alice").await.unwrap();

        let actions: Vec<String> = audit
            .list(&Default::default())
            .await
            .into_iter()
            .map(|e| e.action)
            .collect();
        let approved = actions.iter().position(|a| a == "plan_approved").unwrap();
        let executed = actions.iter().position(|a| a == "action_executed").unwrap();
        let rolled = actions.iter().position(|a| a == "action_rolled_back").unwrap();
        assert!(approved < executed);
        assert!(executed < rolled);
    }

    #[tokio::test]
    async fn test_persistence_survives_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = Arc::new(AuditLog::in_memory());
        let graph = test_graph();

        let plan_id = {
            let (engine, load_err) = ResponseEngine::open(
                dir.path(),
                Arc::new(ScriptedEffector::succeeding()),
                audit.clone(),
            );
            assert!(load_err.is_none());
            let plan = engine.create_plan(&test_alert(false), &graph).await;
            engine.approve(&plan.id, "alice").await.unwrap();
            plan.id
        };

        let (engine, load_err) = ResponseEngine::open(
            dir.path(),
            Arc::new(ScriptedEffector::succeeding()),
            audit,
        );
        assert!(load_err.is_none());
        let plan = engine.get(&plan_id).await.unwrap();
        assert_eq!(plan.state, PlanState::Approved);
        assert!(plan.human_approved);

        // The reloaded plan is executable.
        let executed = engine.execute(&plan_id, "alice").await.unwrap();
        assert_eq!(executed.state, PlanState::Completed);
    }

    #[tokio::test]
    async fn test_deadline_exhaustion_fails_current_action() {
        let engine = engine_with(Arc::new(ScriptedEffector::succeeding()))
            .with_deadline(Duration::ZERO);
        let graph = test_graph();

        let plan = engine.create_plan(&test_alert(true), &graph).await;
        let executed = engine.execute(&plan.id, "system").await.unwrap();

        assert_eq!(executed.state, PlanState::Failed);
        assert_eq!(executed.actions[0].status, ActionStatus::Failed);
        assert!(executed.actions[0]
            .result
            .as_deref()
            .unwrap()
            .contains("deadline"));
    }
}
