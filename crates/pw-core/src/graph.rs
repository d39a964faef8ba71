//! Identity graph data model for Path Warden.
//!
//! A directed multigraph of cloud IAM entities: principals, groups, roles,
//! policies, resources, and services, connected by typed relationship
//! edges. Pure data structure plus queries; no I/O. Nodes and adjacency are
//! kept in ordered maps so every traversal is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

/// Minimum privilege level a node may carry.
pub const PRIVILEGE_MIN: u8 = 0;

/// Maximum privilege level a node may carry (cloud-admin-equivalent).
pub const PRIVILEGE_MAX: u8 = 100;

/// Default depth bound for [`IdentityGraph::reachable`].
pub const DEFAULT_REACHABLE_DEPTH: usize = 4;

/// Attribute key under which an `allows_action` edge stores the granted
/// action verb (e.g. `iam:PassRole`).
pub const ATTR_ACTION: &str = "action";

/// File name of the persisted graph snapshot inside the data directory.
pub const GRAPH_SNAPSHOT_FILE: &str = "graph.snapshot";

/// Errors from graph mutations.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("privilege level {level} out of range [0, 100] for node {id}")]
    PrivilegeOutOfRange { id: String, level: u8 },
}

/// Kinds of nodes in the identity graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// IAM user.
    User,
    /// IAM group.
    Group,
    /// IAM role.
    Role,
    /// Managed or inline policy.
    Policy,
    /// Cloud resource (bucket, instance, cluster, ...).
    Resource,
    /// Cloud service principal.
    Service,
}

impl NodeKind {
    /// Whether this kind represents a principal (something that acts).
    pub fn is_principal(&self) -> bool {
        matches!(self, NodeKind::User | NodeKind::Group | NodeKind::Role)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::User => write!(f, "user"),
            NodeKind::Group => write!(f, "group"),
            NodeKind::Role => write!(f, "role"),
            NodeKind::Policy => write!(f, "policy"),
            NodeKind::Resource => write!(f, "resource"),
            NodeKind::Service => write!(f, "service"),
        }
    }
}

/// Kinds of relationships between nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Principal belongs to a group.
    MemberOf,
    /// Principal or group is governed by a policy.
    HasPolicy,
    /// Principal may obtain the target role's credentials.
    CanAssume,
    /// Policy grants a privileged action on the target resource or role.
    AllowsAction,
    /// Role's assume-role policy trusts the given principal.
    Trusts,
    /// Administrative ownership of a resource.
    Owns,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::MemberOf => write!(f, "member_of"),
            EdgeKind::HasPolicy => write!(f, "has_policy"),
            EdgeKind::CanAssume => write!(f, "can_assume"),
            EdgeKind::AllowsAction => write!(f, "allows_action"),
            EdgeKind::Trusts => write!(f, "trusts"),
            EdgeKind::Owns => write!(f, "owns"),
        }
    }
}

/// A node in the identity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, unique across the graph (e.g. `user:intern_a`).
    pub id: String,
    /// What kind of entity this is.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Effective privilege ranking, 0 (none) to 100 (cloud admin).
    pub privilege_level: u8,
    /// Free-form attributes (e.g. `default_version` on policies).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Node {
    /// Creates a node with empty attributes.
    pub fn new(id: &str, kind: NodeKind, name: &str, privilege_level: u8) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            privilege_level,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute (builder style).
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// A directed, typed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Relationship kind.
    pub kind: EdgeKind,
    /// Edge attributes; `allows_action` stores the verb under `action`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Edge {
    /// Creates an edge with empty attributes.
    pub fn new(source: &str, target: &str, kind: EdgeKind) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute (builder style).
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// The action verb carried by an `allows_action` edge.
    pub fn action(&self) -> Option<&str> {
        self.attributes.get(ATTR_ACTION).map(String::as_str)
    }

    /// Sort key giving the deterministic traversal order: kind, then the
    /// far endpoint, then the action attribute for parallel edges.
    fn sort_key(&self) -> (EdgeKind, &str, &str) {
        (
            self.kind,
            self.target.as_str(),
            self.action().unwrap_or_default(),
        )
    }
}

/// Traversal direction for neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Serializable snapshot of the full graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// In-memory directed multigraph of identity relationships.
///
/// Owned exclusively by the graph store's holder; detection and response
/// only read it. Multiple edges of different kinds (or of the same kind
/// with different attributes) may connect the same pair of nodes.
#[derive(Debug, Clone, Default)]
pub struct IdentityGraph {
    nodes: BTreeMap<String, Node>,
    out_edges: BTreeMap<String, Vec<Edge>>,
    in_edges: BTreeMap<String, Vec<Edge>>,
    edge_count: usize,
}

impl IdentityGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a node by identifier.
    pub fn upsert_node(&mut self, node: Node) -> Result<(), GraphError> {
        if node.privilege_level > PRIVILEGE_MAX {
            return Err(GraphError::PrivilegeOutOfRange {
                id: node.id.clone(),
                level: node.privilege_level,
            });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Inserts an edge. Both endpoints must already exist. An edge with the
    /// same (source, target, kind, attributes) replaces its predecessor.
    pub fn upsert_edge(
        &mut self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        attributes: BTreeMap<String, String>,
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(source) {
            return Err(GraphError::UnknownNode(source.to_string()));
        }
        if !self.nodes.contains_key(target) {
            return Err(GraphError::UnknownNode(target.to_string()));
        }

        let edge = Edge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            attributes,
        };

        let out = self.out_edges.entry(source.to_string()).or_default();
        if let Some(existing) = out.iter_mut().find(|e| **e == edge) {
            *existing = edge;
            return Ok(());
        }
        let pos = out
            .binary_search_by(|e| e.sort_key().cmp(&edge.sort_key()))
            .unwrap_or_else(|p| p);
        out.insert(pos, edge.clone());

        let incoming = self.in_edges.entry(target.to_string()).or_default();
        let pos = incoming
            .binary_search_by(|e| {
                (e.kind, e.source.as_str(), e.action().unwrap_or_default()).cmp(&(
                    edge.kind,
                    edge.source.as_str(),
                    edge.action().unwrap_or_default(),
                ))
            })
            .unwrap_or_else(|p| p);
        incoming.insert(pos, edge);
        self.edge_count += 1;
        Ok(())
    }

    /// Looks up a node by id.
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether the node exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Privilege level of a node, 0 if absent.
    pub fn privilege_level(&self, id: &str) -> u8 {
        self.nodes.get(id).map(|n| n.privilege_level).unwrap_or(0)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Edges and the node on their far side, in deterministic
    /// (kind, far-node id) order, optionally restricted to `kinds`.
    pub fn neighbors<'a>(
        &'a self,
        id: &str,
        direction: Direction,
        kinds: Option<&'a [EdgeKind]>,
    ) -> impl Iterator<Item = (&'a Edge, &'a Node)> + 'a {
        let map = match direction {
            Direction::Outgoing => &self.out_edges,
            Direction::Incoming => &self.in_edges,
        };
        map.get(id)
            .map(|edges| edges.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(move |edge| kinds.is_none_or(|ks| ks.contains(&edge.kind)))
            .filter_map(move |edge| {
                let other = match direction {
                    Direction::Outgoing => &edge.target,
                    Direction::Incoming => &edge.source,
                };
                self.nodes.get(other).map(|node| (edge, node))
            })
    }

    /// Node ids reachable from `id` by a breadth-first traversal of at most
    /// `max_depth` hops over `kinds` (all kinds when `None`). The returned
    /// set includes the start node itself; it is empty when `id` is absent.
    pub fn reachable(
        &self,
        id: &str,
        max_depth: usize,
        kinds: Option<&[EdgeKind]>,
    ) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        if !self.nodes.contains_key(id) {
            return seen;
        }
        seen.insert(id.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back((id.to_string(), 0usize));

        while let Some((current, depth)) = frontier.pop_front() {
            if depth == max_depth {
                continue;
            }
            for (_, node) in self.neighbors(&current, Direction::Outgoing, kinds) {
                if seen.insert(node.id.clone()) {
                    frontier.push_back((node.id.clone(), depth + 1));
                }
            }
        }
        seen
    }

    /// Exports the full graph for persistence.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.out_edges.values().flatten().cloned().collect(),
        }
    }

    /// Rebuilds the graph from a snapshot, replacing all current state.
    pub fn restore(&mut self, snapshot: GraphSnapshot) -> Result<(), GraphError> {
        self.replace_all(snapshot.nodes, snapshot.edges)
    }

    /// Full replacement, as performed after a re-ingest.
    pub fn replace_all(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(), GraphError> {
        let mut fresh = IdentityGraph::new();
        for node in nodes {
            fresh.upsert_node(node)?;
        }
        for edge in edges {
            fresh.upsert_edge(&edge.source, &edge.target, edge.kind, edge.attributes)?;
        }
        *self = fresh;
        Ok(())
    }
}
