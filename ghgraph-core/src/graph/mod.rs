//! Entity graph of users, organisations and repositories.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Graph                           │
//! │                                                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ Nodes        │  │ Edges        │  │ Incidence      │  │
//! │  │ (id → node)  │  │ (pair → edge)│  │ (id → edges)   │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A node's identity is a one-character type tag and the entity's login or
//! full name (`u:octocat`, `o:github`, `r:github/docs`). An edge's identity is
//! its ordered node pair; it carries a set of relationship kinds and a summed
//! strength.

mod edge;
mod node;
mod store;

pub use edge::{Edge, EdgeKind, DEFAULT_STRENGTH, WEAK_STRENGTH};
pub use node::{
    EntityRecord, Node, NodeId, NodeKind, OwnerKind, Profile, RepoIdentity, RepositoryOwner,
    RepositoryRecord,
};
pub use store::Graph;
