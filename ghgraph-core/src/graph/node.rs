//! Graph nodes and the typed entity records they carry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kinds of entities that become graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Organisation,
    Repository,
}

impl NodeKind {
    /// One-character tag used in node identities.
    pub fn tag(&self) -> char {
        match self {
            NodeKind::User => 'u',
            NodeKind::Organisation => 'o',
            NodeKind::Repository => 'r',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::User => "user",
            NodeKind::Organisation => "organisation",
            NodeKind::Repository => "repository",
        }
    }

    fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'u' => Some(NodeKind::User),
            'o' => Some(NodeKind::Organisation),
            'r' => Some(NodeKind::Repository),
            _ => None,
        }
    }
}

/// Node identity: type tag plus login (users, organisations) or full name
/// (repositories), e.g. `u:octocat` or `r:octocat/hello-world`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(kind: NodeKind, key: &str) -> Self {
        Self(format!("{}:{key}", kind.tag()))
    }

    pub fn user(login: &str) -> Self {
        Self::new(NodeKind::User, login)
    }

    pub fn organisation(login: &str) -> Self {
        Self::new(NodeKind::Organisation, login)
    }

    pub fn repository(full_name: &str) -> Self {
        Self::new(NodeKind::Repository, full_name)
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.0.chars().next().and_then(NodeKind::from_tag)
    }

    /// The login or full name after the tag.
    pub fn key(&self) -> &str {
        self.0.get(2..).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields of a user or organisation the crawler and renderer use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub login: String,
    pub id: Option<u64>,
    pub name: Option<String>,
    pub html_url: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
}

/// Who owns a repository, from its `owner.type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
    /// Bots and anything newer; treated like a user.
    #[serde(other)]
    Other,
}

/// Owner sub-object of a repository payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryOwner {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: OwnerKind,
}

/// Minimal identity of a repository: what fork `source`/`parent` entries and
/// repository lists are reduced to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoIdentity {
    pub login: String,
    pub name: String,
    pub full_name: String,
    pub fork: bool,
}

/// The fields of a repository the crawler and renderer use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryRecord {
    pub full_name: String,
    pub name: String,
    pub id: Option<u64>,
    pub owner: Option<RepositoryOwner>,
    pub fork: bool,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub stargazers_count: Option<u64>,
    pub forks_count: Option<u64>,
    pub source: Option<RepoIdentity>,
    pub parent: Option<RepoIdentity>,
}

/// Typed view of a node's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    User(Profile),
    Organisation(Profile),
    Repository(RepositoryRecord),
}

impl EntityRecord {
    /// Parse the typed record for `kind` from an upstream payload.
    ///
    /// Missing or mistyped fields fall back to defaults; error placeholders
    /// parse to a record holding only what they carry.
    pub fn parse(kind: NodeKind, payload: &Value) -> Self {
        match kind {
            NodeKind::User => EntityRecord::User(lenient(payload)),
            NodeKind::Organisation => EntityRecord::Organisation(lenient(payload)),
            NodeKind::Repository => EntityRecord::Repository(lenient(payload)),
        }
    }
}

fn lenient<T: for<'de> Deserialize<'de> + Default>(payload: &Value) -> T {
    serde_json::from_value(payload.clone()).unwrap_or_default()
}

/// A node in the entity graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    record: EntityRecord,
    payload: Value,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, key: &str, payload: Value) -> Self {
        Self {
            id: NodeId::new(kind, key),
            kind,
            record: EntityRecord::parse(kind, &payload),
            payload,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_user(&self) -> bool {
        self.kind == NodeKind::User
    }

    pub fn is_organisation(&self) -> bool {
        self.kind == NodeKind::Organisation
    }

    pub fn is_repository(&self) -> bool {
        self.kind == NodeKind::Repository
    }

    /// Whether this is a placeholder for an entity that could not be fetched.
    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some()
    }

    pub fn record(&self) -> &EntityRecord {
        &self.record
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.record {
            EntityRecord::User(p) | EntityRecord::Organisation(p) => Some(p),
            EntityRecord::Repository(_) => None,
        }
    }

    pub fn repository(&self) -> Option<&RepositoryRecord> {
        match &self.record {
            EntityRecord::Repository(r) => Some(r),
            _ => None,
        }
    }

    /// The full upstream payload, for display and diagnostics.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Human-readable label: login for accounts, full name for repositories.
    pub fn label(&self) -> &str {
        self.id.key()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
