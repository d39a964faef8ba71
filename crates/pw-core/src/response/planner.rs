//! Response plan synthesis.
//!
//! Maps the edges of a detected attack path to an ordered list of
//! containment actions via a fixed recipe. Actions appear in path order,
//! duplicates are dropped keeping the first occurrence, and an operator
//! notification is always appended last.

use crate::detection::{self, Alert, AttackPath, HIGH_PRIVILEGE_THRESHOLD};
use crate::graph::{EdgeKind, IdentityGraph, NodeKind};
use crate::response::model::{Action, ActionKind, ActionTarget};

/// Policy-node attribute naming the known-good default version a
/// `revert_policy_version` action should restore.
pub const ATTR_DEFAULT_VERSION: &str = "default_version";

/// Derives the (kind, target) pairs the recipe produces for a path,
/// excluding the trailing operator notification.
fn action_specs(path: &AttackPath, graph: &IdentityGraph) -> Vec<(ActionKind, ActionTarget)> {
    let mut specs: Vec<(ActionKind, ActionTarget)> = Vec::new();
    let mut push = |spec: (ActionKind, ActionTarget), specs: &mut Vec<(ActionKind, ActionTarget)>| {
        if !specs.contains(&spec) {
            specs.push(spec);
        }
    };

    for (i, edge) in path.edges.iter().enumerate() {
        let from = &path.nodes[i];
        let to = &path.nodes[i + 1];
        match edge.kind {
            EdgeKind::CanAssume => {
                if node_kind(graph, from) == Some(NodeKind::User) {
                    push(
                        (
                            ActionKind::DisableLoginProfile,
                            ActionTarget::Principal { id: from.clone() },
                        ),
                        &mut specs,
                    );
                }
            }
            EdgeKind::HasPolicy => {
                // The ingester stores policy bindings in traversal
                // orientation, so the policy may sit on either end.
                let (principal, policy, policy_idx) =
                    if node_kind(graph, from) == Some(NodeKind::Policy) {
                        (to, from, i)
                    } else {
                        (from, to, i + 1)
                    };
                if !is_privileged_policy(graph, path, policy, policy_idx) {
                    continue;
                }
                let kind = match node_kind(graph, principal) {
                    Some(NodeKind::User) => ActionKind::DetachUserPolicy,
                    Some(NodeKind::Role) => ActionKind::DetachRolePolicy,
                    _ => continue,
                };
                push(
                    (
                        kind,
                        ActionTarget::PrincipalPolicy {
                            principal: principal.clone(),
                            policy: policy.clone(),
                        },
                    ),
                    &mut specs,
                );
            }
            EdgeKind::AllowsAction => {
                if matches!(
                    edge.action.as_deref(),
                    Some("iam:CreatePolicyVersion") | Some("iam:SetDefaultPolicyVersion")
                ) {
                    let prior_version = graph
                        .get_node(to)
                        .and_then(|n| n.attributes.get(ATTR_DEFAULT_VERSION))
                        .cloned();
                    push(
                        (
                            ActionKind::RevertPolicyVersion,
                            ActionTarget::PolicyVersion {
                                policy: to.clone(),
                                prior_version,
                            },
                        ),
                        &mut specs,
                    );
                }
            }
            _ => {}
        }
    }

    // When the path terminates on an admin role, quarantine the last
    // intermediate role the attacker would pivot through. A direct hop has
    // no intermediate role and nothing to quarantine.
    if let Some(target) = path.nodes.last() {
        if detection::is_admin_role(graph, target) {
            let intermediate = path.nodes[1..path.nodes.len().saturating_sub(1)]
                .iter()
                .rev()
                .find(|id| node_kind(graph, id) == Some(NodeKind::Role));
            if let Some(role) = intermediate {
                push(
                    (
                        ActionKind::QuarantineRole,
                        ActionTarget::Principal { id: role.clone() },
                    ),
                    &mut specs,
                );
            }
        }
    }

    specs
}

/// A policy is privileged when it carries high privilege itself or the
/// node that follows it on the path does.
fn is_privileged_policy(
    graph: &IdentityGraph,
    path: &AttackPath,
    policy: &str,
    policy_idx: usize,
) -> bool {
    if graph.privilege_level(policy) >= HIGH_PRIVILEGE_THRESHOLD {
        return true;
    }
    path.nodes
        .get(policy_idx + 1)
        .map(|next| graph.privilege_level(next) >= HIGH_PRIVILEGE_THRESHOLD)
        .unwrap_or(false)
}

fn node_kind(graph: &IdentityGraph, id: &str) -> Option<NodeKind> {
    graph.get_node(id).map(|n| n.kind)
}

/// Action kinds the recipe recommends for a path, notification included,
/// deduplicated in first-occurrence order.
pub fn recommended_kinds(path: &AttackPath, graph: &IdentityGraph) -> Vec<ActionKind> {
    let mut kinds: Vec<ActionKind> = Vec::new();
    for (kind, _) in action_specs(path, graph) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if !kinds.contains(&ActionKind::NotifyOperator) {
        kinds.push(ActionKind::NotifyOperator);
    }
    kinds
}

/// Synthesizes the ordered action list for an alert. `next_id` mints the
/// executor's stable action identifiers.
pub fn build_actions(
    alert: &Alert,
    graph: &IdentityGraph,
    mut next_id: impl FnMut() -> String,
) -> Vec<Action> {
    let mut actions: Vec<Action> = action_specs(&alert.path, graph)
        .into_iter()
        .map(|(kind, target)| Action::planned(next_id(), kind, target))
        .collect();
    actions.push(Action::planned(
        next_id(),
        ActionKind::NotifyOperator,
        ActionTarget::Alert {
            alert_id: alert.id.clone(),
        },
    ));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionConfig, DetectionEngine, ScanParams};
    use crate::graph::{Node, ATTR_ACTION};
    use std::collections::BTreeMap;

    fn action_attrs(action: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(ATTR_ACTION.to_string(), action.to_string());
        map
    }

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
            action_attrs("iam:PassRole"),
        )
        .unwrap();
        g
    }

    fn policy_edit_graph() -> IdentityGraph {
        let mut g = IdentityGraph::new();
        g.upsert_node(Node::new("user:data_lead", NodeKind::User, "data_lead", 50))
            .unwrap();
        g.upsert_node(
            Node::new("policy:ds_custom", NodeKind::Policy, "ds_custom", 0)
                .with_attr(ATTR_DEFAULT_VERSION, "v2"),
        )
        .unwrap();
        g.upsert_node(Node::new(
            "role:analytics_admin",
            NodeKind::Role,
            "analytics_admin",
            95,
        ))
        .unwrap();
        g.upsert_edge(
            "user:data_lead",
            "policy:ds_custom",
            EdgeKind::AllowsAction,
            action_attrs("iam:CreatePolicyVersion"),
        )
        .unwrap();
        g.upsert_edge(
            "user:data_lead",
            "policy:ds_custom",
            EdgeKind::AllowsAction,
            action_attrs("iam:SetDefaultPolicyVersion"),
        )
        .unwrap();
        g.upsert_edge(
            "policy:ds_custom",
            "role:analytics_admin",
            EdgeKind::HasPolicy,
            BTreeMap::new(),
        )
        .unwrap();
        g
    }

    async fn alert_for(graph: &IdentityGraph, start: &str) -> Alert {
        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine
            .scan(
                graph,
                &ScanParams {
                    start_node: Some(start.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        outcome.alerts.into_iter().next().expect("alert expected")
    }

    #[tokio::test]
    async fn test_intern_chain_recipe() {
        let g = intern_graph();
        let alert = alert_for(&g, "user:intern_a").await;

        let mut counter = 0u64;
        let actions = build_actions(&alert, &g, || {
            counter += 1;
            format!("RA-{counter:06}")
        });

        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::DisableLoginProfile,
                ActionKind::QuarantineRole,
                ActionKind::NotifyOperator,
            ]
        );
        assert_eq!(
            actions[0].target,
            ActionTarget::Principal {
                id: "user:intern_a".to_string()
            }
        );
        // The intermediate role is quarantined, not the admin target.
        assert_eq!(
            actions[1].target,
            ActionTarget::Principal {
                id: "role:maintenance".to_string()
            }
        );
        assert_eq!(
            actions[2].target,
            ActionTarget::Alert {
                alert_id: alert.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_policy_edit_recipe() {
        let g = policy_edit_graph();
        let alert = alert_for(&g, "user:data_lead").await;

        let mut counter = 0u64;
        let actions = build_actions(&alert, &g, || {
            counter += 1;
            format!("RA-{counter:06}")
        });

        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::RevertPolicyVersion,
                ActionKind::DetachRolePolicy,
                ActionKind::NotifyOperator,
            ]
        );
        assert_eq!(
            actions[0].target,
            ActionTarget::PolicyVersion {
                policy: "policy:ds_custom".to_string(),
                prior_version: Some("v2".to_string()),
            }
        );
        assert_eq!(
            actions[1].target,
            ActionTarget::PrincipalPolicy {
                principal: "role:analytics_admin".to_string(),
                policy: "policy:ds_custom".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_actions_keep_first_occurrence() {
        // Both parallel policy-edit edges map to the same revert action.
        let g = policy_edit_graph();
        let alert = alert_for(&g, "user:data_lead").await;

        let mut counter = 0u64;
        let actions = build_actions(&alert, &g, || {
            counter += 1;
            format!("RA-{counter:06}")
        });
        let reverts = actions
            .iter()
            .filter(|a| a.kind == ActionKind::RevertPolicyVersion)
            .count();
        assert_eq!(reverts, 1);
    }

    #[tokio::test]
    async fn test_recommended_kinds_capped_shape() {
        let g = intern_graph();
        let alert = alert_for(&g, "user:intern_a").await;
        let kinds = recommended_kinds(&alert.path, &g);
        assert!(kinds.len() <= crate::detection::MAX_RECOMMENDATIONS);
        assert!(kinds.contains(&ActionKind::NotifyOperator));
    }
}
