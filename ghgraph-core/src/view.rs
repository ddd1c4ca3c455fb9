//! Read-only, serializable snapshot of a graph for renderers.
//!
//! Edges are listed once, and every node refers to its edges by index into
//! that list, so a renderer can walk neighbourhoods without a lookup table.

use crate::graph::{EdgeKind, Graph, NodeId, NodeKind};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub error: bool,
    pub payload: Value,
    /// Indices of edges pointing at this node.
    pub incoming: Vec<usize>,
    /// Indices of edges leaving this node.
    pub outgoing: Vec<usize>,
    pub degree: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeView {
    pub from: NodeId,
    pub to: NodeId,
    pub kinds: Vec<EdgeKind>,
    pub strength: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl From<&Graph> for GraphView {
    fn from(graph: &Graph) -> Self {
        let positions = |edges: Vec<&crate::graph::Edge>| -> Vec<usize> {
            edges
                .into_iter()
                .filter_map(|e| graph.edge_position(&e.from, &e.to))
                .collect()
        };

        let nodes = graph
            .nodes()
            .map(|node| NodeView {
                id: node.id().clone(),
                kind: node.kind(),
                label: node.label().to_string(),
                error: node.is_error(),
                payload: node.payload().clone(),
                incoming: positions(graph.edges_in(node.id())),
                outgoing: positions(graph.edges_out(node.id())),
                degree: graph.degree(node.id()),
            })
            .collect();

        let edges = graph
            .edges()
            .map(|edge| EdgeView {
                from: edge.from.clone(),
                to: edge.to.clone(),
                kinds: edge.kinds.iter().copied().collect(),
                strength: edge.strength,
            })
            .collect();

        Self { nodes, edges }
    }
}

impl GraphView {
    pub fn to_json_pretty(&self) -> Result<String, ViewError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ViewError> {
        let path = path.as_ref();
        tokio::fs::write(path, self.to_json_pretty()?).await?;
        info!(
            path = %path.display(),
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "graph written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Graph {
        let mut graph = Graph::new();
        let org = NodeId::organisation("acme");
        let repo = NodeId::repository("acme/rocket");
        let user = NodeId::user("alice");
        graph.add_node(NodeKind::Organisation, "acme", json!({"login": "acme"}));
        graph.add_node(NodeKind::Repository, "acme/rocket", json!({"full_name": "acme/rocket"}));
        graph.add_node(NodeKind::User, "alice", json!({"login": "alice"}));
        graph.add_node(
            NodeKind::Repository,
            "gone/away",
            json!({"full_name": "gone/away", "error": "not found"}),
        );
        graph.add_edge(&org, &repo, EdgeKind::Owns, None);
        graph.add_edge(&user, &org, EdgeKind::MemberOf, None);
        graph.add_edge(&user, &repo, EdgeKind::ContributesTo, Some(0.5));
        graph.add_edge(&user, &repo, EdgeKind::PushedTo, None);
        graph
    }

    #[test]
    fn test_view_indices() {
        let view = GraphView::from(&sample());
        assert_eq!(view.nodes.len(), 4);
        assert_eq!(view.edges.len(), 3);

        let repo = &view.nodes[1];
        assert_eq!(repo.incoming, vec![0, 2]);
        assert!(repo.outgoing.is_empty());
        assert_eq!(repo.degree, 2);

        let user = &view.nodes[2];
        assert_eq!(user.outgoing, vec![1, 2]);
        assert!(view.nodes[3].error);
        assert_eq!(view.nodes[3].degree, 0);

        assert_eq!(view.edges[2].kinds, vec![EdgeKind::ContributesTo, EdgeKind::PushedTo]);
        assert_eq!(view.edges[2].strength, 1.5);
    }

    #[test]
    fn test_json_shape() {
        let text = GraphView::from(&sample()).to_json_pretty().unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["nodes"][0]["id"], "o:acme");
        assert_eq!(json["nodes"][0]["kind"], "organisation");
        assert_eq!(json["edges"][1]["kinds"], json!(["member_of"]));
    }

    #[tokio::test]
    async fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        GraphView::from(&sample()).write_json(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let written: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(written["edges"].as_array().unwrap().len(), 3);
    }
}
