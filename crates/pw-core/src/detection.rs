//! Attack-path detection engine.
//!
//! Bounded depth-first search over the identity graph for simple paths
//! from low-privilege sources to high-privilege targets, scored by
//! per-edge confidence weights, privilege delta, and blast radius.
//! Emitted alerts are deduplicated by a stable content hash so repeated
//! scans over the same graph yield identical identifiers.

use crate::graph::{Direction, EdgeKind, IdentityGraph, Node, NodeKind};
use crate::persist::{self, PersistError};
use crate::response::model::ActionKind;
use crate::response::planner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Maximum number of edges on a detected path.
pub const MAX_PATH_DEPTH: usize = 5;

/// Nodes at or below this privilege level are candidate escalation sources.
pub const LOW_PRIVILEGE_THRESHOLD: u8 = 40;

/// Nodes at or above this privilege level are candidate escalation targets.
pub const HIGH_PRIVILEGE_THRESHOLD: u8 = 70;

/// Roles at or above this privilege level count as admin-equivalent.
pub const ADMIN_PRIVILEGE_THRESHOLD: u8 = 90;

/// Minimum source-to-target privilege gain for an alert.
pub const MIN_PRIVILEGE_DELTA: i32 = 20;

/// Cap on the recommended-action list attached to an alert.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Cap on the blast-radius count.
pub const BLAST_RADIUS_CAP: u32 = 1000;

/// Depth bound of the blast-radius traversal.
pub const BLAST_RADIUS_DEPTH: usize = 3;

/// Wall-clock budget for a scan; on exhaustion partial results are discarded.
pub const DEFAULT_SCAN_BUDGET: Duration = Duration::from_secs(30);

/// File name of the persisted alert set inside the data directory.
pub const ALERTS_FILE: &str = "alerts.json";

/// Edge kinds counted by the blast-radius traversal.
const BLAST_EDGE_KINDS: [EdgeKind; 3] = [
    EdgeKind::CanAssume,
    EdgeKind::AllowsAction,
    EdgeKind::Owns,
];

/// Edge kinds that represent a potential escalation step. Everything else
/// is lateral movement and subject to the downhill prune.
const ESCALATION_EDGE_KINDS: [EdgeKind; 3] = [
    EdgeKind::CanAssume,
    EdgeKind::AllowsAction,
    EdgeKind::HasPolicy,
];

/// Errors from the detection engine.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("unknown start node: {0}")]
    UnknownStartNode(String),

    #[error("scan exceeded its {0:?} budget; partial results discarded")]
    BudgetExceeded(Duration),
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One traversed edge on an attack path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathEdge {
    /// Relationship kind that was traversed.
    pub kind: EdgeKind,
    /// Action verb for `allows_action` edges.
    pub action: Option<String>,
}

/// An ordered walk through the graph from source to target.
///
/// Invariant: `edges.len() == nodes.len() - 1` and every consecutive node
/// pair was connected in the graph at detection time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackPath {
    pub nodes: Vec<String>,
    pub edges: Vec<PathEdge>,
}

impl AttackPath {
    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path is empty (never true for emitted alerts).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A risk-scored privilege-escalation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Deterministic hash of the path and detection parameters.
    pub id: String,
    /// The escalation path.
    pub path: AttackPath,
    /// First node on the path.
    pub source_node: String,
    /// Last node on the path.
    pub target_node: String,
    /// Target privilege minus source privilege.
    pub privilege_delta: i32,
    /// Product of per-edge confidence weights, in [0, 1].
    pub confidence: f64,
    /// Distinct nodes reachable from the target over escalation-relevant
    /// edges within three hops (target included), capped at 1000.
    pub blast_radius: u32,
    /// Severity band of the composite risk score.
    pub severity: Severity,
    /// When this alert was (last) emitted.
    pub detected_at: DateTime<Utc>,
    /// Containment actions suggested by the path, at most five.
    pub recommended_actions: Vec<ActionKind>,
    /// Whether the response planner may auto-approve a plan for this alert.
    pub auto_response_eligible: bool,
}

/// Parameters of one scan invocation.
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    /// Restrict sources to exactly this node.
    pub start_node: Option<String>,
    /// Override the minimum privilege delta.
    pub min_delta: Option<i32>,
    /// Override the wall-clock budget.
    pub budget: Option<Duration>,
}

/// Result of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Alerts emitted by this scan (new or replacing an earlier emission),
    /// ordered by severity descending, then id.
    pub alerts: Vec<Alert>,
    /// How many candidate sources were explored.
    pub scanned_sources: usize,
}

/// Tunable thresholds; defaults match the module constants.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub max_path_depth: usize,
    pub low_privilege_threshold: u8,
    pub high_privilege_threshold: u8,
    pub min_privilege_delta: i32,
    pub scan_budget: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_path_depth: MAX_PATH_DEPTH,
            low_privilege_threshold: LOW_PRIVILEGE_THRESHOLD,
            high_privilege_threshold: HIGH_PRIVILEGE_THRESHOLD,
            min_privilege_delta: MIN_PRIVILEGE_DELTA,
            scan_budget: DEFAULT_SCAN_BUDGET,
        }
    }
}

/// Receiver for alerts that warrant a response plan.
///
/// This handler slot is the only coupling between detection and response:
/// the engine never calls the planner directly, so either side can be
/// swapped for a no-op in tests or mock mode.
#[async_trait]
pub trait PlanHandler: Send + Sync {
    /// Called once per newly emitted or materially changed alert of at
    /// least medium severity.
    async fn on_alert(&self, alert: &Alert);
}

/// The detection engine. Owns the alert set; reads the graph it is given.
pub struct DetectionEngine {
    config: DetectionConfig,
    alerts: RwLock<BTreeMap<String, Alert>>,
    handler: RwLock<Option<Arc<dyn PlanHandler>>>,
    path: Option<PathBuf>,
}

impl DetectionEngine {
    /// Creates an engine with no disk persistence (tests).
    pub fn in_memory(config: DetectionConfig) -> Self {
        Self {
            config,
            alerts: RwLock::new(BTreeMap::new()),
            handler: RwLock::new(None),
            path: None,
        }
    }

    /// Opens the engine backed by `alerts.json` under `data_dir`. A corrupt
    /// file is recoverable: the engine starts empty and the error is
    /// returned for the caller to audit as `persistence_load_failed`.
    pub fn open(data_dir: &Path, config: DetectionConfig) -> (Self, Option<PersistError>) {
        let path = data_dir.join(ALERTS_FILE);
        let (alerts, load_error) = match persist::load_json::<Vec<Alert>>(&path) {
            Ok(Some(list)) => (
                list.into_iter().map(|a| (a.id.clone(), a)).collect(),
                None,
            ),
            Ok(None) => (BTreeMap::new(), None),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "alert store unreadable, starting empty");
                (BTreeMap::new(), Some(err))
            }
        };
        (
            Self {
                config,
                alerts: RwLock::new(alerts),
                handler: RwLock::new(None),
                path: Some(path),
            },
            load_error,
        )
    }

    /// Installs the plan handler invoked for plan-worthy alerts.
    pub async fn set_plan_handler(&self, handler: Arc<dyn PlanHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Runs a scan and merges emitted alerts into the retained set.
    ///
    /// The DFS itself is synchronous and uncancellable; it either completes
    /// within the wall-clock budget or its partial results are discarded.
    pub async fn scan(
        &self,
        graph: &IdentityGraph,
        params: &ScanParams,
    ) -> Result<ScanOutcome, DetectionError> {
        let min_delta = params.min_delta.unwrap_or(self.config.min_privilege_delta);
        let budget = params.budget.unwrap_or(self.config.scan_budget);
        let deadline = Instant::now() + budget;

        let sources: Vec<&Node> = match &params.start_node {
            Some(id) => {
                let node = graph
                    .get_node(id)
                    .ok_or_else(|| DetectionError::UnknownStartNode(id.clone()))?;
                vec![node]
            }
            None => graph
                .nodes()
                .filter(|n| n.privilege_level <= self.config.low_privilege_threshold)
                .collect(),
        };

        let detected_at = Utc::now();
        let mut emitted: BTreeMap<String, Alert> = BTreeMap::new();
        for source in &sources {
            let mut found = Vec::new();
            self.walk(graph, source, deadline, budget, &mut found)?;
            for path in found {
                if let Some(alert) = self.build_alert(graph, path, min_delta, detected_at) {
                    // Later emission replaces earlier within the same scan.
                    emitted.insert(alert.id.clone(), alert);
                }
            }
        }

        debug!(
            sources = sources.len(),
            alerts = emitted.len(),
            "scan complete"
        );

        let mut fresh = Vec::new();
        {
            let mut alerts = self.alerts.write().await;
            for (id, alert) in emitted {
                let changed = match alerts.get(&id) {
                    Some(prior) => {
                        prior.severity != alert.severity
                            || prior.confidence != alert.confidence
                            || prior.blast_radius != alert.blast_radius
                            || prior.privilege_delta != alert.privilege_delta
                    }
                    None => true,
                };
                alerts.insert(id, alert.clone());
                if changed {
                    fresh.push(alert);
                }
            }
        }
        self.persist_alerts().await;

        sort_by_severity(&mut fresh);
        Ok(ScanOutcome {
            alerts: fresh,
            scanned_sources: sources.len(),
        })
    }

    /// Runs a scan, then hands each plan-worthy alert to the installed
    /// handler.
    pub async fn scan_and_dispatch(
        &self,
        graph: &IdentityGraph,
        params: &ScanParams,
    ) -> Result<ScanOutcome, DetectionError> {
        let outcome = self.scan(graph, params).await?;
        self.dispatch(&outcome.alerts).await;
        Ok(outcome)
    }

    /// Hands each plan-worthy alert (severity at least medium) to the
    /// installed handler. Low-severity alerts never trigger a plan.
    ///
    /// Callers that scanned while holding a shared graph lock must release
    /// it before dispatching, since the handler takes its own read of the
    /// graph.
    pub async fn dispatch(&self, alerts: &[Alert]) {
        let handler = self.handler.read().await.clone();
        if let Some(handler) = handler {
            for alert in alerts {
                if alert.severity >= Severity::Medium {
                    info!(alert_id = %alert.id, severity = %alert.severity, "dispatching alert to planner");
                    handler.on_alert(alert).await;
                }
            }
        }
    }

    /// All retained alerts, ordered by severity descending, then id.
    pub async fn alerts(&self) -> Vec<Alert> {
        let mut list: Vec<Alert> = self.alerts.read().await.values().cloned().collect();
        sort_by_severity(&mut list);
        list
    }

    /// Looks up one alert.
    pub async fn get(&self, alert_id: &str) -> Option<Alert> {
        self.alerts.read().await.get(alert_id).cloned()
    }

    /// Explicitly discards all retained alerts. Returns how many were held.
    pub async fn purge(&self) -> usize {
        let purged = {
            let mut alerts = self.alerts.write().await;
            let purged = alerts.len();
            alerts.clear();
            purged
        };
        self.persist_alerts().await;
        purged
    }

    async fn persist_alerts(&self) {
        let Some(path) = &self.path else { return };
        let list: Vec<Alert> = self.alerts.read().await.values().cloned().collect();
        if let Err(err) = persist::write_json(path, &list) {
            warn!(path = %path.display(), error = %err, "failed to persist alerts");
        }
    }

    /// Depth-first walk from `source`, collecting every simple path that
    /// ends on a candidate target.
    fn walk(
        &self,
        graph: &IdentityGraph,
        source: &Node,
        deadline: Instant,
        budget: Duration,
        found: &mut Vec<AttackPath>,
    ) -> Result<(), DetectionError> {
        let mut nodes = vec![source.id.clone()];
        let mut edges = Vec::new();
        self.walk_from(
            graph,
            source,
            &source.id,
            source.privilege_level,
            &mut nodes,
            &mut edges,
            deadline,
            budget,
            found,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_from(
        &self,
        graph: &IdentityGraph,
        source: &Node,
        current: &str,
        max_priv_seen: u8,
        nodes: &mut Vec<String>,
        edges: &mut Vec<PathEdge>,
        deadline: Instant,
        budget: Duration,
        found: &mut Vec<AttackPath>,
    ) -> Result<(), DetectionError> {
        if Instant::now() >= deadline {
            return Err(DetectionError::BudgetExceeded(budget));
        }
        if edges.len() == self.config.max_path_depth {
            return Ok(());
        }

        for (edge, next) in graph.neighbors(current, Direction::Outgoing, None) {
            // Simple paths only.
            if nodes.iter().any(|n| n == &next.id) {
                continue;
            }
            // Purely lateral edges that walk downhill are pruned.
            let downhill = next.privilege_level < source.privilege_level
                && next.privilege_level < max_priv_seen;
            if downhill && !ESCALATION_EDGE_KINDS.contains(&edge.kind) {
                continue;
            }

            nodes.push(next.id.clone());
            edges.push(PathEdge {
                kind: edge.kind,
                action: edge.action().map(str::to_string),
            });

            if next.privilege_level >= self.config.high_privilege_threshold {
                found.push(AttackPath {
                    nodes: nodes.clone(),
                    edges: edges.clone(),
                });
            }

            self.walk_from(
                graph,
                source,
                &next.id,
                max_priv_seen.max(next.privilege_level),
                nodes,
                edges,
                deadline,
                budget,
                found,
            )?;

            edges.pop();
            nodes.pop();
        }
        Ok(())
    }

    /// Scores a found path; `None` when the privilege gate rejects it.
    fn build_alert(
        &self,
        graph: &IdentityGraph,
        path: AttackPath,
        min_delta: i32,
        detected_at: DateTime<Utc>,
    ) -> Option<Alert> {
        let source = graph.get_node(path.nodes.first()?)?;
        let target = graph.get_node(path.nodes.last()?)?;
        let privilege_delta = target.privilege_level as i32 - source.privilege_level as i32;
        if privilege_delta < min_delta {
            return None;
        }

        let confidence = path_confidence(graph, &path).clamp(0.0, 1.0);
        let blast_radius = blast_radius(graph, &target.id);
        let score = confidence * privilege_delta as f64 * (1.0 + blast_radius as f64).log2();
        let severity = severity_for_score(score);
        let auto_response_eligible = confidence >= 0.85
            && blast_radius <= 50
            && matches!(severity, Severity::Medium | Severity::High);

        let mut recommended_actions = planner::recommended_kinds(&path, graph);
        recommended_actions.truncate(MAX_RECOMMENDATIONS);

        Some(Alert {
            id: alert_id(&path, min_delta),
            source_node: source.id.clone(),
            target_node: target.id.clone(),
            path,
            privilege_delta,
            confidence,
            blast_radius,
            severity,
            detected_at,
            recommended_actions,
            auto_response_eligible,
        })
    }
}

/// Product of per-edge confidence weights.
fn path_confidence(graph: &IdentityGraph, path: &AttackPath) -> f64 {
    path.edges
        .iter()
        .enumerate()
        .map(|(i, edge)| edge_weight(graph, &path.nodes[i], edge, &path.nodes[i + 1]))
        .product()
}

/// Confidence weight of one traversed edge.
fn edge_weight(graph: &IdentityGraph, from: &str, edge: &PathEdge, to: &str) -> f64 {
    match edge.kind {
        EdgeKind::CanAssume => {
            if trust_satisfied(graph, from, to) {
                0.95
            } else {
                0.50
            }
        }
        EdgeKind::MemberOf | EdgeKind::HasPolicy => 0.99,
        EdgeKind::AllowsAction => match edge.action.as_deref() {
            Some("iam:PassRole") if is_admin_role(graph, to) => 0.90,
            Some("iam:CreatePolicyVersion") | Some("iam:SetDefaultPolicyVersion") => 0.85,
            Some("sts:AssumeRole") => 0.80,
            _ => 0.50,
        },
        _ => 0.50,
    }
}

/// A `can_assume` edge has satisfied trust when the role trusts the
/// assuming principal, or carries no trust edges at all (the ingester only
/// emits `can_assume` it has verified).
fn trust_satisfied(graph: &IdentityGraph, principal: &str, role: &str) -> bool {
    let mut any = false;
    for (_, trusted) in graph.neighbors(role, Direction::Outgoing, Some(&[EdgeKind::Trusts])) {
        any = true;
        if trusted.id == principal {
            return true;
        }
    }
    !any
}

/// Whether `id` is an admin-equivalent role.
pub(crate) fn is_admin_role(graph: &IdentityGraph, id: &str) -> bool {
    graph
        .get_node(id)
        .map(|n| n.kind == NodeKind::Role && n.privilege_level >= ADMIN_PRIVILEGE_THRESHOLD)
        .unwrap_or(false)
}

/// Distinct nodes reachable from the target over escalation-relevant edges
/// within three hops, target included, capped.
fn blast_radius(graph: &IdentityGraph, target: &str) -> u32 {
    let reachable = graph.reachable(target, BLAST_RADIUS_DEPTH, Some(&BLAST_EDGE_KINDS));
    (reachable.len() as u32).min(BLAST_RADIUS_CAP)
}

/// Severity band of a composite risk score.
fn severity_for_score(score: f64) -> Severity {
    if score >= 80.0 {
        Severity::Critical
    } else if score >= 40.0 {
        Severity::High
    } else if score >= 15.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Stable identifier over the ordered (node id, edge kind) tuples of the
/// path plus the effective detection parameter.
fn alert_id(path: &AttackPath, min_delta: i32) -> String {
    let mut hasher = Sha256::new();
    for (i, node) in path.nodes.iter().enumerate() {
        hasher.update(node.as_bytes());
        hasher.update([0x1f]);
        if let Some(edge) = path.edges.get(i) {
            hasher.update(edge.kind.to_string().as_bytes());
            hasher.update([0x1f]);
        }
    }
    hasher.update(format!("min_delta:{min_delta}").as_bytes());
    hex::encode(hasher.finalize())
}

fn sort_by_severity(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeKind};
    use std::collections::BTreeMap;

    fn attrs(action: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(crate::graph::ATTR_ACTION.to_string(), action.to_string());
        map
    }

    /// The intern chain: user(10) -> role(60) -> admin role(100) -> ec2.
    fn intern_graph() -> IdentityGraph {
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
        g.upsert_node(Node::new("resource:ec2", NodeKind::Resource, "ec2", 0))
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
            EdgeKind::AllowsAction,
            attrs("iam:PassRole"),
        )
        .unwrap();
        g.upsert_edge(
            "role:prod_admin",
            "resource:ec2",
            EdgeKind::CanAssume,
            BTreeMap::new(),
        )
        .unwrap();
        g
    }

    #[tokio::test]
    async fn test_intern_chain_detected_as_critical() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine
            .scan(
                &g,
                &ScanParams {
                    start_node: Some("user:intern_a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // One path reaches a target: intern -> maintenance -> prod_admin.
        assert_eq!(outcome.alerts.len(), 1);
        let alert = &outcome.alerts[0];
        assert_eq!(alert.path.len(), 3);
        assert_eq!(alert.source_node, "user:intern_a");
        assert_eq!(alert.target_node, "role:prod_admin");
        assert_eq!(alert.privilege_delta, 90);
        // 0.95 (can_assume, trust unopposed) * 0.90 (PassRole onto admin).
        assert!((alert.confidence - 0.855).abs() < 1e-9);
        // prod_admin plus the ec2 resource behind it.
        assert_eq!(alert.blast_radius, 2);
        assert_eq!(alert.severity, Severity::Critical);
        // Critical is never auto-eligible.
        assert!(!alert.auto_response_eligible);
    }

    #[tokio::test]
    async fn test_below_threshold_delta_produces_no_alert() {
        let mut g = IdentityGraph::new();
        g.upsert_node(Node::new("user:ops", NodeKind::User, "ops", 60))
            .unwrap();
        g.upsert_node(Node::new("role:mid", NodeKind::Role, "mid", 70))
            .unwrap();
        g.upsert_edge("user:ops", "role:mid", EdgeKind::CanAssume, BTreeMap::new())
            .unwrap();

        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine
            .scan(
                &g,
                &ScanParams {
                    start_node: Some("user:ops".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // Delta 10 < MIN_PRIVILEGE_DELTA 20.
        assert!(outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_scan_is_deterministic() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let params = ScanParams::default();

        let first = engine.scan(&g, &params).await.unwrap();
        let ids_first: Vec<String> = engine.alerts().await.iter().map(|a| a.id.clone()).collect();

        let second = engine.scan(&g, &params).await.unwrap();
        let ids_second: Vec<String> = engine.alerts().await.iter().map(|a| a.id.clone()).collect();

        assert_eq!(ids_first, ids_second);
        assert!(!first.alerts.is_empty());
        // Nothing changed, so the second scan reports no new alerts.
        assert!(second.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_start_node_is_an_error() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let result = engine
            .scan(
                &g,
                &ScanParams {
                    start_node: Some("user:ghost".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DetectionError::UnknownStartNode(_))));
    }

    #[tokio::test]
    async fn test_trust_mismatch_lowers_confidence() {
        let mut g = intern_graph();
        g.upsert_node(Node::new("user:other", NodeKind::User, "other", 10))
            .unwrap();
        // maintenance now trusts only user:other, not the intern.
        g.upsert_edge(
            "role:maintenance",
            "user:other",
            EdgeKind::Trusts,
            BTreeMap::new(),
        )
        .unwrap();

        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine
            .scan(
                &g,
                &ScanParams {
                    start_node: Some("user:intern_a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let alert = &outcome.alerts[0];
        // 0.50 (unsatisfied trust) * 0.90.
        assert!((alert.confidence - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_paths_are_simple_and_depth_bounded() {
        // A cycle: a -> b -> a, with b also escalating to an admin role.
        let mut g = IdentityGraph::new();
        g.upsert_node(Node::new("role:a", NodeKind::Role, "a", 10))
            .unwrap();
        g.upsert_node(Node::new("role:b", NodeKind::Role, "b", 30))
            .unwrap();
        g.upsert_node(Node::new("role:admin", NodeKind::Role, "admin", 95))
            .unwrap();
        g.upsert_edge("role:a", "role:b", EdgeKind::CanAssume, BTreeMap::new())
            .unwrap();
        g.upsert_edge("role:b", "role:a", EdgeKind::CanAssume, BTreeMap::new())
            .unwrap();
        g.upsert_edge("role:b", "role:admin", EdgeKind::CanAssume, BTreeMap::new())
            .unwrap();

        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine
            .scan(
                &g,
                &ScanParams {
                    start_node: Some("role:a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.alerts.len(), 1);
        let alert = &outcome.alerts[0];
        // The cycle was not revisited.
        assert_eq!(alert.path.nodes, vec!["role:a", "role:b", "role:admin"]);
    }

    #[tokio::test]
    async fn test_confidence_within_bounds_for_all_alerts() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        engine.scan(&g, &ScanParams::default()).await.unwrap();
        for alert in engine.alerts().await {
            assert!((0.0..=1.0).contains(&alert.confidence));
            assert!(alert.privilege_delta >= MIN_PRIVILEGE_DELTA);
        }
    }

    #[tokio::test]
    async fn test_every_path_step_is_a_graph_edge() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        engine.scan(&g, &ScanParams::default()).await.unwrap();

        for alert in engine.alerts().await {
            for pair in alert.path.nodes.windows(2) {
                let connected = g
                    .neighbors(&pair[0], Direction::Outgoing, None)
                    .any(|(_, n)| n.id == pair[1]);
                assert!(connected, "no edge between {} and {}", pair[0], pair[1]);
            }
        }
    }

    #[tokio::test]
    async fn test_exhausted_budget_discards_results() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let result = engine
            .scan(
                &g,
                &ScanParams {
                    budget: Some(Duration::ZERO),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DetectionError::BudgetExceeded(_))));
        assert!(engine.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_clears_alerts() {
        let g = intern_graph();
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        engine.scan(&g, &ScanParams::default()).await.unwrap();
        assert!(!engine.alerts().await.is_empty());

        let purged = engine.purge().await;
        assert!(purged > 0);
        assert!(engine.alerts().await.is_empty());
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_for_score(120.0), Severity::Critical);
        assert_eq!(severity_for_score(80.0), Severity::Critical);
        assert_eq!(severity_for_score(79.9), Severity::High);
        assert_eq!(severity_for_score(40.0), Severity::High);
        assert_eq!(severity_for_score(39.9), Severity::Medium);
        assert_eq!(severity_for_score(15.0), Severity::Medium);
        assert_eq!(severity_for_score(14.9), Severity::Low);
    }

    #[test]
    fn test_alert_id_depends_on_path_and_params() {
        let path = AttackPath {
            nodes: vec!["user:a".to_string(), "role:b".to_string()],
            edges: vec![PathEdge {
                kind: EdgeKind::CanAssume,
                action: None,
            }],
        };
        let id1 = alert_id(&path, 20);
        let id2 = alert_id(&path, 20);
        let id3 = alert_id(&path, 30);
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }
}
