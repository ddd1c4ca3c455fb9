//! Testing utilities for crawls without network access.
//!
//! This module provides:
//! - Payload fixtures shaped like GitHub API responses
//! - `MockGithub`, which scripts those payloads on a mock transport and
//!   hands out accessors backed by a shared in-memory cache

use crate::api::Github;
use crate::cache::MemoryCache;
use crate::graph::OwnerKind;
use ghclient::testing::MockTransport;
use ghclient::{ClientConfig, GithubClient};
use serde_json::{json, Value};
use std::sync::Arc;

/// Requests per hour for mock clients; keeps paused-clock tests short.
const MOCK_REQUESTS_PER_HOUR: u32 = 3_600_000;

fn api_url(path: &str) -> String {
    format!("{}{path}", ClientConfig::default().base_url)
}

/// A stable fake numeric id for a name.
fn fake_id(name: &str) -> u64 {
    name.bytes()
        .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
        % 1_000_000
}

/// A user object.
pub fn user_json(login: &str) -> Value {
    json!({
        "login": login,
        "id": fake_id(login),
        "type": "User",
        "name": login.to_uppercase(),
        "html_url": format!("https://github.com/{login}"),
        "location": "Earth",
        "public_repos": 2,
        "followers": 10,
        "following": 1,
    })
}

/// An organisation object, with its `members_url` template.
pub fn org_json(login: &str) -> Value {
    json!({
        "login": login,
        "id": fake_id(login),
        "type": "Organization",
        "name": login.to_uppercase(),
        "members_url": api_url(&format!("orgs/{login}/members{{/member}}")),
        "public_repos": 5,
        "followers": 100,
    })
}

/// A repository object that is not a fork.
pub fn repo_json(owner: &str, name: &str, owner_kind: OwnerKind) -> Value {
    let owner_type = match owner_kind {
        OwnerKind::Organization => "Organization",
        _ => "User",
    };
    json!({
        "id": fake_id(&format!("{owner}/{name}")),
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "fork": false,
        "owner": {"login": owner, "id": fake_id(owner), "type": owner_type},
        "description": format!("The {name} project"),
        "stargazers_count": 3,
        "watchers_count": 3,
        "forks_count": 1,
        "open_issues_count": 2,
        "size": 100,
    })
}

/// A repository object that is a user's fork of `source` (`owner/name`).
/// The embedded `source` and `parent` are full repository objects, as the
/// API returns them.
pub fn fork_json(owner: &str, name: &str, source: &str) -> Value {
    let (source_owner, source_name) = source.split_once('/').unwrap_or((source, name));
    let upstream = repo_json(source_owner, source_name, OwnerKind::User);
    let mut fork = repo_json(owner, name, OwnerKind::User);
    fork["fork"] = json!(true);
    fork["source"] = upstream.clone();
    fork["parent"] = upstream;
    fork
}

/// An activity event of `kind` (e.g. `PushEvent`) on `repo` (`owner/name`).
pub fn event_json(kind: &str, repo: &str) -> Value {
    json!({
        "id": fake_id(repo).to_string(),
        "type": kind,
        "actor": {"login": "someone", "id": 1},
        "org": {"login": "some-org", "id": 2},
        "repo": {"id": fake_id(repo), "name": repo},
        "payload": {},
    })
}

/// A contributor entry.
pub fn contributor_json(login: &str, contributions: u64) -> Value {
    json!({
        "login": login,
        "id": fake_id(login),
        "type": "User",
        "avatar_url": format!("https://avatars.example/{login}"),
        "contributions": contributions,
    })
}

/// A scripted GitHub.
///
/// Register entities with the builder-style methods, then create accessors
/// with [`MockGithub::accessor`]. All accessors share the transport and the
/// in-memory cache, so tests can inspect both afterwards.
#[derive(Clone, Default)]
pub struct MockGithub {
    transport: MockTransport,
    cache: Arc<MemoryCache>,
}

impl MockGithub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full API URL for a path like `users/octocat`.
    pub fn url(path: &str) -> String {
        api_url(path)
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    /// Script an arbitrary JSON response.
    pub fn respond(&self, path: &str, body: Value) -> &Self {
        self.transport.respond_json(&api_url(path), body);
        self
    }

    pub fn user(&self, login: &str) -> &Self {
        self.respond(&format!("users/{login}"), user_json(login))
    }

    /// An organisation and its member list.
    pub fn org(&self, login: &str, members: &[&str]) -> &Self {
        let members: Vec<Value> = members.iter().map(|m| user_json(m)).collect();
        self.respond(&format!("orgs/{login}"), org_json(login))
            .respond(&format!("orgs/{login}/members"), json!(members))
    }

    /// A repository, under its `full_name`.
    pub fn repo(&self, repo: Value) -> &Self {
        let full_name = repo["full_name"].as_str().unwrap_or_default().to_string();
        self.respond(&format!("repos/{full_name}"), repo)
    }

    pub fn user_repos(&self, login: &str, repos: &[Value]) -> &Self {
        self.respond(&format!("users/{login}/repos"), json!(repos))
    }

    pub fn org_repos(&self, login: &str, repos: &[Value]) -> &Self {
        self.respond(&format!("orgs/{login}/repos"), json!(repos))
    }

    pub fn user_events(&self, login: &str, events: &[Value]) -> &Self {
        self.respond(&format!("users/{login}/events"), json!(events))
    }

    pub fn org_events(&self, login: &str, events: &[Value]) -> &Self {
        self.respond(&format!("orgs/{login}/events"), json!(events))
    }

    /// Contributors of `full_name` as `(login, contributions)` pairs.
    pub fn contributors(&self, full_name: &str, contributors: &[(&str, u64)]) -> &Self {
        let list: Vec<Value> = contributors
            .iter()
            .map(|(login, count)| contributor_json(login, *count))
            .collect();
        self.respond(&format!("repos/{full_name}/contributors"), json!(list))
    }

    /// A network-enabled accessor over the mock transport and shared cache.
    pub async fn accessor(&self) -> Result<Github, ghclient::Error> {
        let config = ClientConfig::new().with_requests_per_hour(MOCK_REQUESTS_PER_HOUR);
        let client = GithubClient::with_transport(Box::new(self.transport.clone()), config).await?;
        Ok(Github::new(Box::new(self.cache.clone()), Some(client)))
    }

    /// An accessor over the shared cache only.
    pub fn offline_accessor(&self) -> Github {
        Github::new(Box::new(self.cache.clone()), None)
    }
}
