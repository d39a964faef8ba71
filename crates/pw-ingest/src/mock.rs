//! Deterministic mock IAM estate.
//!
//! Generates a simulated AWS account without API calls or costs: users
//! across departments, roles in privilege tiers, managed policies with
//! versions, and resources. The estate embeds two known escalation chains
//! (an over-trusted intern and a policy-editing data lead) so a scan of
//! the mock graph always has something to find.

use crate::{IngestError, Ingester};
use async_trait::async_trait;
use pw_core::{Edge, EdgeKind, Node, NodeKind, ATTR_ACTION};
use tracing::info;

/// Departments the generated users rotate through.
const DEPARTMENTS: [&str; 6] = [
    "engineering",
    "data_science",
    "finance",
    "hr",
    "interns",
    "contractors",
];

/// Role templates: (name, privilege level).
const ROLE_TEMPLATES: [(&str, u8); 7] = [
    ("AdminRole", 100),
    ("PowerUserRole", 85),
    ("AuditorRole", 65),
    ("BillingRole", 60),
    ("DataEngineerRole", 70),
    ("DeveloperRole", 25),
    ("ReadOnlyRole", 20),
];

/// Mock ingester producing a deterministic simulated account.
pub struct MockIamIngester {
    user_count: usize,
}

impl Default for MockIamIngester {
    fn default() -> Self {
        Self { user_count: 40 }
    }
}

impl MockIamIngester {
    /// Creates the generator with the default estate size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides how many rank-and-file users are generated.
    pub fn with_user_count(mut self, user_count: usize) -> Self {
        self.user_count = user_count;
        self
    }

    fn build(&self) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        // Department groups.
        for dept in DEPARTMENTS {
            nodes.push(Node::new(
                &format!("group:{dept}"),
                NodeKind::Group,
                dept,
                10,
            ));
        }

        // Roles from the templates.
        for (template, privilege) in ROLE_TEMPLATES {
            let id = format!("role:{}", to_snake(template));
            nodes.push(Node::new(&id, NodeKind::Role, template, privilege));
        }

        // Managed policies with version history.
        nodes.push(
            Node::new(
                "policy:administrator_access",
                NodeKind::Policy,
                "AdministratorAccess",
                100,
            )
            .with_attr("default_version", "v1"),
        );
        nodes.push(
            Node::new("policy:read_only", NodeKind::Policy, "ReadOnlyAccess", 15)
                .with_attr("default_version", "v1"),
        );
        nodes.push(
            Node::new("policy:ds_custom", NodeKind::Policy, "DataScienceCustom", 30)
                .with_attr("default_version", "v2"),
        );

        edges.push(Edge::new(
            "policy:administrator_access",
            "role:admin_role",
            EdgeKind::HasPolicy,
        ));

        // Resources owned by the admin tier.
        for (resource, owner) in [
            ("resource:prod_vpc", "role:admin_role"),
            ("resource:billing_s3", "role:billing_role"),
            ("resource:audit_trail", "role:auditor_role"),
            ("resource:data_warehouse", "role:data_engineer_role"),
        ] {
            nodes.push(Node::new(
                resource,
                NodeKind::Resource,
                resource.trim_start_matches("resource:"),
                0,
            ));
            edges.push(Edge::new(owner, resource, EdgeKind::Owns));
        }

        // Rank-and-file users, deterministically distributed.
        for i in 0..self.user_count {
            let dept = DEPARTMENTS[i % DEPARTMENTS.len()];
            let id = format!("user:employee_{:03}", i + 1);
            let privilege = match dept {
                "interns" | "contractors" => 5,
                "engineering" => 30,
                _ => 20,
            };
            nodes.push(Node::new(
                &id,
                NodeKind::User,
                &format!("employee_{:03}", i + 1),
                privilege,
            ));
            edges.push(Edge::new(&id, &format!("group:{dept}"), EdgeKind::MemberOf));
            edges.push(Edge::new(&id, "policy:read_only", EdgeKind::HasPolicy));
        }

        // Escalation chain one: an intern who can assume a maintenance role
        // that may pass the admin role.
        nodes.push(Node::new(
            "user:intern_a",
            NodeKind::User,
            "intern_a",
            10,
        ));
        nodes.push(Node::new(
            "role:maintenance",
            NodeKind::Role,
            "maintenance",
            60,
        ));
        edges.push(Edge::new(
            "user:intern_a",
            "group:interns",
            EdgeKind::MemberOf,
        ));
        edges.push(Edge::new(
            "user:intern_a",
            "role:maintenance",
            EdgeKind::CanAssume,
        ));
        edges.push(Edge::new("role:maintenance", "user:intern_a", EdgeKind::Trusts));
        edges.push(
            Edge::new("role:maintenance", "role:admin_role", EdgeKind::AllowsAction)
                .with_attr(ATTR_ACTION, "iam:PassRole"),
        );

        // Escalation chain two: a data lead with policy-edit rights on a
        // policy that governs the power-user tier.
        nodes.push(Node::new(
            "user:data_lead",
            NodeKind::User,
            "data_lead",
            50,
        ));
        edges.push(Edge::new(
            "user:data_lead",
            "group:data_science",
            EdgeKind::MemberOf,
        ));
        for action in ["iam:CreatePolicyVersion", "iam:SetDefaultPolicyVersion"] {
            edges.push(
                Edge::new("user:data_lead", "policy:ds_custom", EdgeKind::AllowsAction)
                    .with_attr(ATTR_ACTION, action),
            );
        }
        edges.push(Edge::new(
            "policy:ds_custom",
            "role:power_user_role",
            EdgeKind::HasPolicy,
        ));
        edges.push(
            Edge::new("role:power_user_role", "role:admin_role", EdgeKind::AllowsAction)
                .with_attr(ATTR_ACTION, "sts:AssumeRole"),
        );

        (nodes, edges)
    }
}

#[async_trait]
impl Ingester for MockIamIngester {
    async fn ingest(&self) -> Result<(Vec<Node>, Vec<Edge>), IngestError> {
        let (nodes, edges) = self.build();
        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            "mock IAM estate generated"
        );
        Ok((nodes, edges))
    }
}

fn to_snake(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_core::{DetectionConfig, DetectionEngine, IdentityGraph, ScanParams, Severity};

    #[tokio::test]
    async fn test_generation_is_deterministic() {
        let ingester = MockIamIngester::new();
        let (nodes_a, edges_a) = ingester.ingest().await.unwrap();
        let (nodes_b, edges_b) = ingester.ingest().await.unwrap();

        let ids = |nodes: &[Node]| nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&nodes_a), ids(&nodes_b));
        assert_eq!(edges_a.len(), edges_b.len());
    }

    #[tokio::test]
    async fn test_estate_loads_into_graph() {
        let (nodes, edges) = MockIamIngester::new().ingest().await.unwrap();
        let mut graph = IdentityGraph::new();
        graph.replace_all(nodes, edges).unwrap();

        assert!(graph.has_node("user:intern_a"));
        assert!(graph.has_node("role:admin_role"));
        assert!(graph.has_node("policy:ds_custom"));
        assert!(graph.node_count() > 40);
    }

    #[tokio::test]
    async fn test_embedded_chains_are_detectable() {
        let (nodes, edges) = MockIamIngester::new().ingest().await.unwrap();
        let mut graph = IdentityGraph::new();
        graph.replace_all(nodes, edges).unwrap();

        let engine = DetectionEngine::in_memory(DetectionConfig::default());
        let outcome = engine.scan(&graph, &ScanParams::default()).await.unwrap();

        assert!(!outcome.alerts.is_empty());
        // The intern chain surfaces at high severity or above.
        let intern_alert = outcome
            .alerts
            .iter()
            .find(|a| a.source_node == "user:intern_a")
            .expect("intern chain detected");
        assert!(intern_alert.severity >= Severity::High);
    }

    #[test]
    fn test_to_snake() {
        assert_eq!(to_snake("AdminRole"), "admin_role");
        assert_eq!(to_snake("ReadOnlyRole"), "read_only_role");
    }
}
