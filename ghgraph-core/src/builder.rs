//! Bounded-depth graph construction.
//!
//! The builder expands entities from a worklist of `(target, budget)` tasks
//! instead of recursing. Tasks are taken highest budget first (oldest first
//! among equals), and an entity is resolved and expanded only by the first
//! task that reaches it. Since no task can hand out more budget than the
//! tasks taken before it, that first task always carries the largest budget
//! any discovered path offers, and nothing is ever expanded twice.
//!
//! Each task may carry the edge that led to it. The edge is recorded when the
//! task is taken, whether or not its target already exists, so every
//! discovered relationship ends up in the graph.

use crate::api::{ApiError, Github};
use crate::config::CrawlConfig;
use crate::graph::{EdgeKind, Graph, NodeId, NodeKind, OwnerKind};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort a crawl. Entities that cannot be found are not errors.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// What a task resolves to a node.
#[derive(Debug, Clone)]
enum Target {
    User(String),
    Organisation(String),
    /// A login that may name either a user or an organisation.
    Account(String),
    /// A repository by full name. A fork is replaced by its source, but the
    /// node keeps the name it was asked for.
    RepoByName(String),
    /// A repository whose record is already fetched; taken as is.
    Repo(Value),
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// The task's target is the edge source.
    FromTarget,
    /// The task's target is the edge destination.
    ToTarget,
}

/// The edge through which a task was discovered.
#[derive(Debug, Clone)]
struct Link {
    other: NodeId,
    direction: Direction,
    kind: EdgeKind,
    strength: Option<f64>,
}

impl Link {
    fn from_target(to: &NodeId, kind: EdgeKind) -> Self {
        Self {
            other: to.clone(),
            direction: Direction::FromTarget,
            kind,
            strength: None,
        }
    }

    fn to_target(from: &NodeId, kind: EdgeKind) -> Self {
        Self {
            other: from.clone(),
            direction: Direction::ToTarget,
            kind,
            strength: None,
        }
    }

    fn with_strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }
}

#[derive(Debug)]
struct Task {
    budget: u32,
    seq: u64,
    target: Target,
    link: Option<Link>,
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.budget
            .cmp(&other.budget)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

/// Builds an entity graph by crawling outward from seed entities.
///
/// Seeds can be added one after another; each call runs until its worklist
/// is empty, and entities already in the graph are never expanded again.
pub struct GraphBuilder {
    github: Github,
    config: CrawlConfig,
    graph: Graph,
    queue: BinaryHeap<Task>,
    next_seq: u64,
}

impl GraphBuilder {
    pub fn new(github: Github, config: CrawlConfig) -> Self {
        Self {
            github,
            config,
            graph: Graph::new(),
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn accessor_mut(&mut self) -> &mut Github {
        &mut self.github
    }

    /// Add a user and follow its relations up to `depth` hops
    /// (default `follow_depth`). `None` if the user cannot be found.
    pub async fn add_user(
        &mut self,
        login: &str,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        self.build(Target::User(login.to_string()), depth).await
    }

    /// Add an organisation and follow its relations.
    pub async fn add_organisation(
        &mut self,
        login: &str,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        self.build(Target::Organisation(login.to_string()), depth)
            .await
    }

    /// Add a login as an organisation if it is one, otherwise as a user.
    pub async fn add_user_or_org(
        &mut self,
        login: &str,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        self.build(Target::Account(login.to_string()), depth).await
    }

    /// Add a repository by full name and follow its relations.
    ///
    /// Always yields a node: a fork stands in for its source repository, and
    /// a repository that cannot be found becomes an error placeholder.
    pub async fn add_repo(
        &mut self,
        full_name: &str,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        self.build(Target::RepoByName(full_name.to_string()), depth)
            .await
    }

    async fn build(
        &mut self,
        target: Target,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        let budget = depth.unwrap_or(self.config.follow_depth);
        let result = self.crawl(target, budget).await;
        // budgets only live for one call; a failed crawl leaves tasks behind
        self.queue.clear();
        let id = result?;

        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "graph built"
        );
        Ok(id)
    }

    async fn crawl(
        &mut self,
        target: Target,
        budget: u32,
    ) -> Result<Option<NodeId>, BuildError> {
        let seed = self.task(budget, target, None);
        let id = self.process(seed).await?;
        while let Some(task) = self.queue.pop() {
            self.process(task).await?;
        }
        Ok(id)
    }

    fn task(&mut self, budget: u32, target: Target, link: Option<Link>) -> Task {
        let seq = self.next_seq;
        self.next_seq += 1;
        Task {
            budget,
            seq,
            target,
            link,
        }
    }

    fn push(&mut self, budget: u32, target: Target, link: Link) {
        let task = self.task(budget, target, Some(link));
        self.queue.push(task);
    }

    /// Resolve a task's target, record its edge, and expand it if new.
    async fn process(&mut self, task: Task) -> Result<Option<NodeId>, BuildError> {
        let Some((id, created)) = self.resolve(&task.target).await? else {
            debug!(entity = ?task.target, "not found, skipping");
            return Ok(None);
        };

        if let Some(link) = &task.link {
            let (from, to) = match link.direction {
                Direction::FromTarget => (&id, &link.other),
                Direction::ToTarget => (&link.other, &id),
            };
            self.graph.add_edge(from, to, link.kind, link.strength);
        }

        if created && task.budget > 0 {
            self.expand(&id, task.budget - 1).await?;
        }
        Ok(Some(id))
    }

    /// Find or create the node for a target. The flag tells whether the node
    /// was created now.
    async fn resolve(&mut self, target: &Target) -> Result<Option<(NodeId, bool)>, BuildError> {
        match target {
            Target::User(login) => self.resolve_account(NodeKind::User, login).await,
            Target::Organisation(login) => {
                self.resolve_account(NodeKind::Organisation, login).await
            }
            Target::Account(login) => {
                if let Some(node) = self.graph.find_user_or_org(login) {
                    return Ok(Some((node.id().clone(), false)));
                }
                let kind = if self.github.is_organisation(login).await? {
                    NodeKind::Organisation
                } else {
                    NodeKind::User
                };
                self.resolve_account(kind, login).await
            }
            Target::RepoByName(full_name) => {
                let id = NodeId::repository(full_name);
                if self.graph.contains(&id) {
                    return Ok(Some((id, false)));
                }
                let payload = self.fetch_repo_or_source(full_name).await?;
                Ok(Some(self.insert(NodeKind::Repository, full_name, payload)))
            }
            Target::Repo(record) => {
                let full_name = record
                    .get("full_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if full_name.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.insert(
                    NodeKind::Repository,
                    full_name,
                    record.clone(),
                )))
            }
        }
    }

    async fn resolve_account(
        &mut self,
        kind: NodeKind,
        login: &str,
    ) -> Result<Option<(NodeId, bool)>, BuildError> {
        let id = NodeId::new(kind, login);
        if self.graph.contains(&id) {
            return Ok(Some((id, false)));
        }
        let payload = match kind {
            NodeKind::Organisation => self.github.get_organisation(login).await?,
            _ => self.github.get_user(login).await?,
        };
        Ok(payload.map(|p| self.insert(kind, login, p)))
    }

    fn insert(&mut self, kind: NodeKind, key: &str, payload: Value) -> (NodeId, bool) {
        let (node, created) = self.graph.add_node(kind, key, payload);
        (node.id().clone(), created)
    }

    /// The repository's record, or its source's if it is a fork, or an error
    /// placeholder.
    async fn fetch_repo_or_source(&mut self, full_name: &str) -> Result<Value, BuildError> {
        let mut repo = self.github.get_repo(full_name).await?;

        let source = repo
            .as_ref()
            .filter(|r| r.get("fork").and_then(Value::as_bool).unwrap_or(false))
            .and_then(|r| r.get("source"))
            .and_then(|s| s.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(source) = source {
            debug!(fork = full_name, source = %source, "substituting fork source");
            repo = self.github.get_repo(&source).await?;
        }

        Ok(repo.unwrap_or_else(|| {
            json!({
                "full_name": full_name,
                "error": "not found",
            })
        }))
    }

    async fn expand(&mut self, id: &NodeId, budget: u32) -> Result<(), BuildError> {
        debug!(node = %id, budget, "expanding");
        let login = id.key().to_string();
        match id.kind() {
            Some(NodeKind::User) => {
                self.expand_repos(id, &login, budget).await?;
                self.expand_events(id, &login, budget).await?;
            }
            Some(NodeKind::Organisation) => {
                self.expand_repos(id, &login, budget).await?;
                self.expand_events(id, &login, budget).await?;
                self.expand_members(id, &login, budget).await?;
            }
            Some(NodeKind::Repository) => self.expand_repository(id, budget).await?,
            None => {}
        }
        Ok(())
    }

    /// Owned repositories; forks only when configured.
    async fn expand_repos(
        &mut self,
        owner: &NodeId,
        login: &str,
        budget: u32,
    ) -> Result<(), BuildError> {
        let Some(list) = self.github.get_repo_list(login).await? else {
            return Ok(());
        };
        for item in list {
            let listed_fork = item.get("fork").and_then(Value::as_bool).unwrap_or(false);
            if listed_fork && !self.config.follow_forks {
                continue;
            }
            let Some(full_name) = item.get("full_name").and_then(Value::as_str) else {
                continue;
            };
            let Some(repo) = self.github.get_repo(full_name).await? else {
                continue;
            };
            let fork = repo.get("fork").and_then(Value::as_bool).unwrap_or(false);
            self.push(
                budget,
                Target::Repo(repo),
                Link::to_target(owner, EdgeKind::ownership(fork)),
            );
        }
        Ok(())
    }

    /// Pushes and issue comments. Events name repositories only, so those are
    /// looked up by name with one hop less.
    async fn expand_events(
        &mut self,
        actor: &NodeId,
        login: &str,
        budget: u32,
    ) -> Result<(), BuildError> {
        let Some(events) = self.github.get_events(login).await? else {
            return Ok(());
        };
        for event in events {
            let kind = match event.get("type").and_then(Value::as_str) {
                Some("PushEvent") => EdgeKind::PushedTo,
                Some("IssueCommentEvent") => EdgeKind::CommentedOn,
                _ => continue,
            };
            let Some(repo_name) = event
                .get("repo")
                .and_then(|r| r.get("name"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            self.push(
                budget.saturating_sub(1),
                Target::RepoByName(repo_name.to_string()),
                Link::to_target(actor, kind),
            );
        }
        Ok(())
    }

    async fn expand_members(
        &mut self,
        org: &NodeId,
        login: &str,
        budget: u32,
    ) -> Result<(), BuildError> {
        let Some(members) = self.github.get_organisation_members(login).await? else {
            return Ok(());
        };
        for member in members {
            let Some(member_login) = member.get("login").and_then(Value::as_str) else {
                continue;
            };
            self.push(
                budget,
                Target::Account(member_login.to_string()),
                Link::from_target(org, EdgeKind::MemberOf),
            );
        }
        Ok(())
    }

    /// Owner, upstream (for forks taken as is) and weighted contributors.
    async fn expand_repository(&mut self, id: &NodeId, budget: u32) -> Result<(), BuildError> {
        let Some(node) = self.graph.node(id) else {
            return Ok(());
        };
        let Some(repo) = node.repository().cloned() else {
            return Ok(());
        };
        // partially populated records carry no id; their contributors are skipped
        let has_id = node.get("id").is_some();

        if let Some(owner) = repo.owner.as_ref().filter(|o| !o.login.is_empty()) {
            let target = match owner.kind {
                OwnerKind::Organization => Target::Organisation(owner.login.clone()),
                _ => Target::User(owner.login.clone()),
            };
            self.push(budget, target, Link::from_target(id, EdgeKind::ownership(repo.fork)));
        }

        if let Some(source) = repo.source.as_ref().filter(|_| repo.fork) {
            if !source.full_name.is_empty() && source.full_name != repo.full_name {
                self.push(
                    budget,
                    Target::RepoByName(source.full_name.clone()),
                    Link::to_target(id, EdgeKind::ForkOf),
                );
            }
        }

        if !has_id {
            return Ok(());
        }
        let contributors = self.github.get_repo_contributors(&repo.full_name).await?;
        let Some(contributors) = contributors else {
            return Ok(());
        };
        let count = |c: &Value| c.get("contributions").and_then(Value::as_f64).unwrap_or(0.0);
        let total = contributors.iter().map(count).sum::<f64>().max(1.0);
        for contributor in &contributors {
            let Some(login) = contributor.get("login").and_then(Value::as_str) else {
                continue;
            };
            self.push(
                budget,
                Target::User(login.to_string()),
                Link::from_target(id, EdgeKind::ContributesTo)
                    .with_strength(count(contributor) / total),
            );
        }
        Ok(())
    }
}
