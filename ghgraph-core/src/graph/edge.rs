//! Relationship edges between nodes.

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default strength of a relationship.
pub const DEFAULT_STRENGTH: f64 = 1.0;

/// Strength of weak or derivative relationships (forks, comments).
pub const WEAK_STRENGTH: f64 = 0.1;

/// Kinds of relationships between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Account is a member of an organisation.
    MemberOf,
    /// Account owns a repository.
    Owns,
    /// Account owns a repository that is a fork.
    Forked,
    /// Repository is a fork of another.
    ForkOf,
    /// User contributed commits to a repository.
    ContributesTo,
    /// Account pushed to a repository.
    PushedTo,
    /// Account commented on an issue of a repository.
    CommentedOn,
}

impl EdgeKind {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            EdgeKind::MemberOf => "member",
            EdgeKind::Owns => "owns",
            EdgeKind::Forked => "forked",
            EdgeKind::ForkOf => "forkof",
            EdgeKind::ContributesTo => "contributes",
            EdgeKind::PushedTo => "pushed",
            EdgeKind::CommentedOn => "commented",
        }
    }

    /// Strength a single relationship of this kind contributes.
    pub fn default_strength(&self) -> f64 {
        match self {
            EdgeKind::Forked | EdgeKind::CommentedOn => WEAK_STRENGTH,
            _ => DEFAULT_STRENGTH,
        }
    }

    /// Ownership kind for a repository, depending on whether it is a fork.
    pub fn ownership(fork: bool) -> Self {
        if fork {
            EdgeKind::Forked
        } else {
            EdgeKind::Owns
        }
    }
}

/// A directed edge. At most one exists per ordered node pair; further
/// relationships between the pair merge into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kinds: BTreeSet<EdgeKind>,
    /// Accumulated strength, summed over every merged relationship.
    pub strength: f64,
}

impl Edge {
    pub(crate) fn new(from: NodeId, to: NodeId, kind: EdgeKind, strength: f64) -> Self {
        Self {
            from,
            to,
            kinds: BTreeSet::from([kind]),
            strength,
        }
    }

    /// Add another relationship between the same pair.
    pub(crate) fn merge(&mut self, kind: EdgeKind, strength: f64) {
        self.kinds.insert(kind);
        self.strength += strength;
    }

    pub fn has_kind(&self, kind: EdgeKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_owner(&self) -> bool {
        self.has_kind(EdgeKind::Owns)
    }

    pub fn is_contributor(&self) -> bool {
        self.has_kind(EdgeKind::ContributesTo)
    }

    pub fn is_member(&self) -> bool {
        self.has_kind(EdgeKind::MemberOf)
    }

    /// Check if this edge touches a node.
    pub fn involves(&self, id: &NodeId) -> bool {
        &self.from == id || &self.to == id
    }

    /// Get the node at the other end.
    pub fn other(&self, id: &NodeId) -> Option<&NodeId> {
        if &self.from == id {
            Some(&self.to)
        } else if &self.to == id {
            Some(&self.from)
        } else {
            None
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.kinds.iter().map(EdgeKind::name).collect();
        write!(f, "({} {} {})", self.from, kinds.join("/"), self.to)
    }
}
