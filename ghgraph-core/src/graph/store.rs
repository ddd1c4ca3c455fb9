//! The graph aggregate: node and edge collections with their indexes.

use super::edge::{Edge, EdgeKind};
use super::node::{Node, NodeId, NodeKind};
use serde_json::Value;
use std::collections::HashMap;

/// Entity graph built by a crawl.
///
/// Mutation is crate-private and only ever additive: nodes are created once
/// per identity and edges only gain kinds and strength. Everything public is a
/// read-only query.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in creation order.
    nodes: Vec<Node>,
    /// Identity index into `nodes`.
    node_index: HashMap<NodeId, usize>,
    /// Edges in creation order.
    edges: Vec<Edge>,
    /// Ordered pair index into `edges`.
    edge_index: HashMap<(NodeId, NodeId), usize>,
    /// Edges touching each node, incoming and outgoing.
    incident: HashMap<NodeId, Vec<usize>>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add a node, unless one with the same identity exists.
    ///
    /// Returns the node and whether it was created by this call. Callers use
    /// the flag to decide whether to expand the entity's relations.
    pub(crate) fn add_node(&mut self, kind: NodeKind, key: &str, payload: Value) -> (&Node, bool) {
        let id = NodeId::new(kind, key);
        if let Some(&index) = self.node_index.get(&id) {
            return (&self.nodes[index], false);
        }

        let index = self.nodes.len();
        self.nodes.push(Node::new(kind, key, payload));
        self.node_index.insert(id, index);
        (&self.nodes[index], true)
    }

    /// Record a relationship between two nodes.
    ///
    /// `strength` defaults to the kind's default strength. If the ordered pair
    /// is already connected, the kind joins the existing edge's set and the
    /// strength is added to its total.
    pub(crate) fn add_edge(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        kind: EdgeKind,
        strength: Option<f64>,
    ) -> &Edge {
        let strength = strength.unwrap_or_else(|| kind.default_strength());
        let pair = (from.clone(), to.clone());

        if let Some(&index) = self.edge_index.get(&pair) {
            self.edges[index].merge(kind, strength);
            return &self.edges[index];
        }

        let index = self.edges.len();
        self.edges
            .push(Edge::new(from.clone(), to.clone(), kind, strength));
        self.edge_index.insert(pair, index);
        self.incident.entry(from.clone()).or_default().push(index);
        if from != to {
            self.incident.entry(to.clone()).or_default().push(index);
        }
        &self.edges[index]
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    /// The user or organisation node for `login`, whichever exists.
    pub fn find_user_or_org(&self, login: &str) -> Option<&Node> {
        self.node(&NodeId::user(login))
            .or_else(|| self.node(&NodeId::organisation(login)))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// All edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// The edge from `from` to `to`, if any.
    pub fn edge(&self, from: &NodeId, to: &NodeId) -> Option<&Edge> {
        self.edge_index
            .get(&(from.clone(), to.clone()))
            .map(|&i| &self.edges[i])
    }

    /// Index of an edge in [`Graph::edges`] order.
    pub fn edge_position(&self, from: &NodeId, to: &NodeId) -> Option<usize> {
        self.edge_index.get(&(from.clone(), to.clone())).copied()
    }

    /// Edges pointing at `id`.
    pub fn edges_in(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges_of(id).into_iter().filter(|e| &e.to == id).collect()
    }

    /// Edges leaving `id`.
    pub fn edges_out(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges_of(id)
            .into_iter()
            .filter(|e| &e.from == id)
            .collect()
    }

    /// Incoming and outgoing edges of `id`; a self-loop appears once.
    pub fn edges_of(&self, id: &NodeId) -> Vec<&Edge> {
        self.incident
            .get(id)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Number of edges touching `id`.
    pub fn degree(&self, id: &NodeId) -> usize {
        self.incident.get(id).map_or(0, Vec::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One-line-per-item listing of nodes and edges, for debugging.
    pub fn dump(&self) -> String {
        let nodes: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        let edges: Vec<String> = self.edges.iter().map(ToString::to_string).collect();
        format!(
            "NODES:\n{}\nEDGES:\n{}\n",
            nodes.join("\n"),
            edges.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = Graph::new();

        let (first, created) =
            graph.add_node(NodeKind::User, "octocat", json!({"login": "octocat"}));
        let first = first as *const Node;
        assert!(created);

        let (second, created) =
            graph.add_node(NodeKind::User, "octocat", json!({"login": "changed"}));
        assert!(!created);
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.payload()["login"], "octocat");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_same_login_different_kinds() {
        let mut graph = Graph::new();
        graph.add_node(NodeKind::User, "acme", json!({}));
        let (_, created) = graph.add_node(NodeKind::Organisation, "acme", json!({}));
        assert!(created);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.find_user_or_org("acme").unwrap().is_user());
    }

    #[test]
    fn test_edge_merge_sums_strength() {
        let mut graph = Graph::new();
        let a = NodeId::user("a");
        let b = NodeId::repository("a/b");
        graph.add_node(NodeKind::User, "a", json!({}));
        graph.add_node(NodeKind::Repository, "a/b", json!({}));

        graph.add_edge(&a, &b, EdgeKind::Owns, Some(0.5));
        let edge = graph.add_edge(&a, &b, EdgeKind::ContributesTo, Some(0.25));

        assert_eq!(edge.kinds.len(), 2);
        assert!(edge.is_owner() && edge.is_contributor());
        assert_eq!(edge.strength, 0.75);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_edge_default_strengths() {
        let mut graph = Graph::new();
        let a = NodeId::user("a");
        let b = NodeId::repository("x/b");

        assert_eq!(graph.add_edge(&a, &b, EdgeKind::CommentedOn, None).strength, 0.1);
        let merged = graph.add_edge(&a, &b, EdgeKind::PushedTo, None).strength;
        assert!((merged - 1.1).abs() < 1e-9);
        assert_eq!(graph.add_edge(&b, &a, EdgeKind::Forked, None).strength, 0.1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_edges_of_node() {
        let mut graph = Graph::new();
        let user = NodeId::user("u");
        let org = NodeId::organisation("o");
        let repo = NodeId::repository("o/r");

        graph.add_edge(&user, &org, EdgeKind::MemberOf, None);
        graph.add_edge(&org, &repo, EdgeKind::Owns, None);
        graph.add_edge(&user, &repo, EdgeKind::ContributesTo, Some(1.0));

        assert_eq!(graph.edges_in(&org).len(), 1);
        assert_eq!(graph.edges_out(&org).len(), 1);
        assert_eq!(graph.edges_of(&org).len(), 2);
        assert_eq!(graph.degree(&repo), 2);
        assert_eq!(graph.edges_out(&user).len(), 2);
        assert!(graph.edges_in(&user).is_empty());
        assert_eq!(graph.edge_position(&org, &repo), Some(1));
    }

    #[test]
    fn test_self_loop_counted_once() {
        let mut graph = Graph::new();
        let repo = NodeId::repository("a/b");
        graph.add_edge(&repo, &repo, EdgeKind::ForkOf, None);
        assert_eq!(graph.edges_of(&repo).len(), 1);
        assert_eq!(graph.edges_in(&repo).len(), 1);
        assert_eq!(graph.edges_out(&repo).len(), 1);
    }
}
