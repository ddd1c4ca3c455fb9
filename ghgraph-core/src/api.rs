//! Cache-backed access to GitHub resources.
//!
//! Every resource kind has its own cache table and key fields:
//!
//! ```text
//! user/{login}                 user object
//! org/{login}                  organisation object
//! repo/{login, name}           repository, by owner login and short name
//! repos/{login}                repository list of a user or organisation
//! events/{login}               event list of a user or organisation
//! members/{login}              member list of an organisation
//! contributors/{login, name}   contributor list of a repository
//! ```
//!
//! Lookups are read-through: the cache is consulted first, and on a miss the
//! resource is fetched, transformed, stamped with its key fields and stored.
//! Failed fetches are never stored and surface as `None`.

use crate::cache::{CacheError, CacheStore, Key};
use crate::config::CrawlConfig;
use ghclient::GithubClient;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Field marking a failed fetch in a record. Such records are never cached.
const ERROR_FIELD: &str = "ERROR";

/// Field holding the items of a cached list resource.
const LIST_FIELD: &str = "list";

/// Errors from resource access. Missing resources are not errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Client error: {0}")]
    Client(#[from] ghclient::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Cache tables, one per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    User,
    Org,
    Repo,
    Repos,
    Events,
    Members,
    Contributors,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::User,
        Table::Org,
        Table::Repo,
        Table::Repos,
        Table::Events,
        Table::Members,
        Table::Contributors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::User => "user",
            Table::Org => "org",
            Table::Repo => "repo",
            Table::Repos => "repos",
            Table::Events => "events",
            Table::Members => "members",
            Table::Contributors => "contributors",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown cache table: {s}"))
    }
}

/// A cacheable API resource: its table plus identifying key fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuery {
    pub table: Table,
    pub key: Key,
}

impl ResourceQuery {
    fn login(table: Table, login: &str) -> Self {
        let mut key = Map::new();
        key.insert("login".to_string(), json!(login));
        Self { table, key }
    }

    fn login_name(table: Table, login: &str, name: &str) -> Self {
        let mut query = Self::login(table, login);
        query.key.insert("name".to_string(), json!(name));
        query
    }

    pub fn user(login: &str) -> Self {
        Self::login(Table::User, login)
    }

    pub fn org(login: &str) -> Self {
        Self::login(Table::Org, login)
    }

    pub fn repo(login: &str, name: &str) -> Self {
        Self::login_name(Table::Repo, login, name)
    }

    pub fn repos(login: &str) -> Self {
        Self::login(Table::Repos, login)
    }

    pub fn events(login: &str) -> Self {
        Self::login(Table::Events, login)
    }

    pub fn members(login: &str) -> Self {
        Self::login(Table::Members, login)
    }

    pub fn contributors(login: &str, name: &str) -> Self {
        Self::login_name(Table::Contributors, login, name)
    }
}

/// Split `owner/name` into its parts.
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    match full_name.split_once('/') {
        Some((login, name)) if !login.is_empty() && !name.is_empty() && !name.contains('/') => {
            Some((login, name))
        }
        _ => None,
    }
}

// ============================================================================
// Transforms
// ============================================================================

type Transform = fn(Value) -> Value;

/// Minimal identity of a repository: `{login, name, full_name, fork}`.
pub fn repo_identity(repo: &Value) -> Value {
    let login = repo
        .get("owner")
        .and_then(|o| o.get("login"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let name = repo.get("name").and_then(Value::as_str).unwrap_or_default();
    json!({
        "login": login,
        "name": name,
        "full_name": format!("{login}/{name}"),
        "fork": repo.get("fork").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Reduce embedded fork `source` and `parent` repositories to their identity.
fn transform_repo(mut repo: Value) -> Value {
    if let Some(map) = repo.as_object_mut() {
        for key in ["source", "parent"] {
            if let Some(embedded) = map.get(key) {
                let identity = repo_identity(embedded);
                map.insert(key.to_string(), identity);
            }
        }
    }
    repo
}

/// Drop the actor and organisation entries repeated in every event.
fn transform_event(mut event: Value) -> Value {
    if let Some(map) = event.as_object_mut() {
        map.remove("actor");
        map.remove("org");
    }
    event
}

fn transform_repo_list_item(repo: Value) -> Value {
    repo_identity(&repo)
}

/// Keep only `login`, `id` and `contributions` of a contributor.
fn transform_contributor(contributor: Value) -> Value {
    let mut projected = Map::new();
    if let Value::Object(mut map) = contributor {
        for key in ["login", "id", "contributions"] {
            if let Some(value) = map.remove(key) {
                projected.insert(key.to_string(), value);
            }
        }
    }
    Value::Object(projected)
}

// ============================================================================
// Accessor
// ============================================================================

/// Read-through access to GitHub resources.
///
/// With cache reads disabled every lookup goes to the network (results are
/// still stored); with the network disabled only cached records are seen.
pub struct Github {
    cache: Box<dyn CacheStore>,
    client: Option<GithubClient>,
    use_cache: bool,
    use_network: bool,
}

impl Github {
    /// Create an accessor. Without a client the network is never used.
    pub fn new(cache: Box<dyn CacheStore>, client: Option<GithubClient>) -> Self {
        Self {
            use_network: client.is_some(),
            cache,
            client,
            use_cache: true,
        }
    }

    /// Create an accessor with the cache and network switches of `config`.
    pub fn from_config(
        config: &CrawlConfig,
        cache: Box<dyn CacheStore>,
        client: Option<GithubClient>,
    ) -> Self {
        Self::new(cache, client)
            .with_use_cache(config.use_cache)
            .with_use_network(config.use_network)
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_use_network(mut self, use_network: bool) -> Self {
        self.use_network = use_network;
        self
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn uses_network(&self) -> bool {
        self.use_network && self.client.is_some()
    }

    pub fn client(&self) -> Option<&GithubClient> {
        self.client.as_ref()
    }

    /// Remove cached records of `table`: those matching `filter`, or the
    /// whole table when no filter is given.
    pub async fn clear_cache(&self, table: Table, filter: Option<&Key>) -> Result<usize, ApiError> {
        match filter {
            Some(filter) => Ok(self.cache.delete_many(table.name(), filter).await?),
            None => {
                self.cache.drop_table(table.name()).await?;
                Ok(0)
            }
        }
    }

    /// Whether `login` is an organisation, i.e. an organisation lookup succeeds.
    pub async fn is_organisation(&mut self, login: &str) -> Result<bool, ApiError> {
        Ok(self.get_organisation(login).await?.is_some())
    }

    /// Whether `login` is a regular user (and not an organisation).
    pub async fn is_user(&mut self, login: &str) -> Result<bool, ApiError> {
        if self.is_organisation(login).await? {
            return Ok(false);
        }
        Ok(self.get_user(login).await?.is_some())
    }

    pub async fn get_user(&mut self, login: &str) -> Result<Option<Value>, ApiError> {
        self.get_cached(&format!("users/{login}"), &ResourceQuery::user(login), None)
            .await
    }

    /// Organisations look almost like users; the key difference is that
    /// they carry a `members_url`.
    pub async fn get_organisation(&mut self, login: &str) -> Result<Option<Value>, ApiError> {
        self.get_cached(&format!("orgs/{login}"), &ResourceQuery::org(login), None)
            .await
    }

    /// Recent events of a user or organisation.
    pub async fn get_events(&mut self, login: &str) -> Result<Option<Vec<Value>>, ApiError> {
        let path = format!("{}/{login}/events", self.account_prefix(login).await?);
        self.get_cached_list(&path, &ResourceQuery::events(login), Some(transform_event))
            .await
    }

    /// Members of an organisation, from its `members_url`.
    pub async fn get_organisation_members(
        &mut self,
        login: &str,
    ) -> Result<Option<Vec<Value>>, ApiError> {
        let Some(org) = self.get_organisation(login).await? else {
            return Ok(None);
        };
        let members_url = org
            .get("members_url")
            .and_then(Value::as_str)
            .and_then(|url| url.split('{').next())
            .unwrap_or_default()
            .to_string();
        if members_url.is_empty() {
            return Ok(None);
        }
        self.get_cached_list(&members_url, &ResourceQuery::members(login), None)
            .await
    }

    /// Repository identities (`login`, `name`, `full_name`, `fork`) of a user
    /// or organisation.
    pub async fn get_repo_list(&mut self, login: &str) -> Result<Option<Vec<Value>>, ApiError> {
        let path = format!("{}/{login}/repos", self.account_prefix(login).await?);
        self.get_cached_list(
            &path,
            &ResourceQuery::repos(login),
            Some(transform_repo_list_item),
        )
        .await
    }

    /// Full repository objects of a user or organisation. Repositories whose
    /// lookup fails are left out.
    pub async fn get_repos(&mut self, login: &str) -> Result<Option<Vec<Value>>, ApiError> {
        let Some(list) = self.get_repo_list(login).await? else {
            return Ok(None);
        };
        let mut repos = Vec::with_capacity(list.len());
        for item in &list {
            let Some(full_name) = item.get("full_name").and_then(Value::as_str) else {
                continue;
            };
            if let Some(repo) = self.get_repo(full_name).await? {
                repos.push(repo);
            }
        }
        Ok(Some(repos))
    }

    /// A repository by full name (`owner/name`).
    pub async fn get_repo(&mut self, full_name: &str) -> Result<Option<Value>, ApiError> {
        match split_full_name(full_name) {
            Some((login, name)) => self.get_repo_by(login, name).await,
            None => Ok(None),
        }
    }

    /// A repository by owner login and short name.
    pub async fn get_repo_by(
        &mut self,
        login: &str,
        name: &str,
    ) -> Result<Option<Value>, ApiError> {
        self.get_cached(
            &format!("repos/{login}/{name}"),
            &ResourceQuery::repo(login, name),
            Some(transform_repo),
        )
        .await
    }

    /// Contributors (`login`, `id`, `contributions`) of a repository.
    pub async fn get_repo_contributors(
        &mut self,
        full_name: &str,
    ) -> Result<Option<Vec<Value>>, ApiError> {
        let Some((login, name)) = split_full_name(full_name) else {
            return Ok(None);
        };
        self.get_cached_list(
            &format!("repos/{login}/{name}/contributors"),
            &ResourceQuery::contributors(login, name),
            Some(transform_contributor),
        )
        .await
    }

    /// Users and organisations have parallel endpoints under different roots.
    async fn account_prefix(&mut self, login: &str) -> Result<&'static str, ApiError> {
        Ok(if self.is_organisation(login).await? {
            "orgs"
        } else {
            "users"
        })
    }

    async fn get_cached_list(
        &mut self,
        path: &str,
        query: &ResourceQuery,
        transform: Option<Transform>,
    ) -> Result<Option<Vec<Value>>, ApiError> {
        let record = self.get_cached(path, query, transform).await?;
        Ok(record.and_then(|mut r| match r.get_mut(LIST_FIELD).map(Value::take) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }))
    }

    async fn get_cached(
        &mut self,
        path: &str,
        query: &ResourceQuery,
        transform: Option<Transform>,
    ) -> Result<Option<Value>, ApiError> {
        if !self.use_cache && !self.use_network {
            return Ok(None);
        }

        let mut record = if self.use_cache {
            self.read_cache(query).await?
        } else {
            None
        };

        if record.is_none() && self.use_network {
            if let Some(client) = self.client.as_mut() {
                let mut fetched = fetch_record(client, path, transform).await?;
                if let Some(map) = fetched.as_object_mut() {
                    map.extend(query.key.clone());
                }
                if fetched.get(ERROR_FIELD).is_none() {
                    self.cache
                        .upsert(query.table.name(), &query.key, &fetched)
                        .await?;
                }
                record = Some(fetched);
            }
        }

        Ok(record.filter(|r| r.get(ERROR_FIELD).is_none()))
    }

    async fn read_cache(&self, query: &ResourceQuery) -> Result<Option<Value>, ApiError> {
        let record = self.cache.find_one(query.table.name(), &query.key).await?;
        if record.is_some() {
            debug!(table = query.table.name(), key = ?query.key, "read-cache");
        }
        Ok(record)
    }
}

/// Fetch `path` and shape it into a cache record: lists are wrapped under
/// `list`, upstream errors become `{ERROR: message}`.
async fn fetch_record(
    client: &mut GithubClient,
    path: &str,
    transform: Option<Transform>,
) -> Result<Value, ApiError> {
    let data = client.get(path, &[]).await?;
    let transform = transform.unwrap_or(|v| v);

    Ok(match data {
        Value::Array(items) => {
            json!({ LIST_FIELD: items.into_iter().map(transform).collect::<Vec<_>>() })
        }
        data => match ghclient::error_message(&data) {
            Some(message) => json!({ ERROR_FIELD: message }),
            None => transform(data),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::graph::OwnerKind;
    use crate::testing::{contributor_json, event_json, fork_json, repo_json, MockGithub};

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("octocat/hello"), Some(("octocat", "hello")));
        assert_eq!(split_full_name("octocat"), None);
        assert_eq!(split_full_name("/hello"), None);
        assert_eq!(split_full_name("a/b/c"), None);
    }

    #[test]
    fn test_table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>(), Ok(table));
        }
        assert!("nope".parse::<Table>().is_err());
    }

    #[test]
    fn test_transform_repo_projects_fork_sources() {
        let fork = transform_repo(fork_json("me", "hello", "up/hello"));
        assert_eq!(
            fork["source"],
            json!({"login": "up", "name": "hello", "full_name": "up/hello", "fork": false})
        );
        assert_eq!(fork["parent"]["full_name"], "up/hello");
        assert_eq!(fork["full_name"], "me/hello");
    }

    #[test]
    fn test_transform_contributor_projection() {
        let projected = transform_contributor(contributor_json("octocat", 12));
        let id = contributor_json("octocat", 12)["id"].clone();
        assert_eq!(
            projected,
            json!({"login": "octocat", "id": id, "contributions": 12})
        );
    }

    #[test]
    fn test_transform_event_strips_actor_and_org() {
        let event = transform_event(event_json("PushEvent", "octocat/hello"));
        assert!(event.get("actor").is_none());
        assert!(event.get("org").is_none());
        assert_eq!(event["repo"]["name"], "octocat/hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_stores_and_stamps_key() {
        let mock = MockGithub::new();
        mock.repo(repo_json("octocat", "hello", OwnerKind::User));
        let mut github = mock.accessor().await.unwrap();

        let repo = github.get_repo("octocat/hello").await.unwrap().unwrap();
        assert_eq!(repo["login"], "octocat");
        assert_eq!(repo["name"], "hello");

        let cached = mock
            .cache()
            .find_one("repo", &ResourceQuery::repo("octocat", "hello").key)
            .await
            .unwrap();
        assert_eq!(cached, Some(repo));

        // second lookup is served from the cache
        github.get_repo("octocat/hello").await.unwrap().unwrap();
        assert_eq!(mock.transport().requests_to(&MockGithub::url("repos/octocat/hello")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_absent_and_not_cached() {
        let mock = MockGithub::new();
        let mut github = mock.accessor().await.unwrap();

        assert!(github.get_user("ghost").await.unwrap().is_none());
        assert!(github.get_user("ghost").await.unwrap().is_none());
        assert_eq!(mock.cache().record_count("user").await, 0);
        assert_eq!(mock.transport().requests_to(&MockGithub::url("users/ghost")), 2);
    }

    #[tokio::test]
    async fn test_cache_only_mode() {
        let cache = MemoryCache::new();
        cache
            .insert("user", &json!({"login": "octocat", "followers": 9}))
            .await
            .unwrap();
        let mut github = Github::new(Box::new(cache), None);

        let user = github.get_user("octocat").await.unwrap().unwrap();
        assert_eq!(user, json!({"login": "octocat", "followers": 9}));
        assert!(github.get_user("someone-else").await.unwrap().is_none());
        assert!(!github.uses_network());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_only_mode_makes_no_requests() {
        let mock = MockGithub::new();
        mock.user("octocat");
        let mut github = mock.accessor().await.unwrap().with_use_network(false);

        assert!(github.get_user("octocat").await.unwrap().is_none());
        assert_eq!(mock.transport().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_enabled_is_absent() {
        let mock = MockGithub::new();
        mock.user("octocat");
        let mut github = mock
            .accessor()
            .await
            .unwrap()
            .with_use_cache(false)
            .with_use_network(false);

        assert!(github.get_user("octocat").await.unwrap().is_none());
        assert_eq!(mock.transport().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_only_refreshes_cache() {
        let mock = MockGithub::new();
        mock.user("octocat");
        mock.cache()
            .insert("user", &json!({"login": "octocat", "stale": true}))
            .await
            .unwrap();
        let mut github = mock.accessor().await.unwrap().with_use_cache(false);

        let user = github.get_user("octocat").await.unwrap().unwrap();
        assert!(user.get("stale").is_none());
        assert_eq!(mock.cache().record_count("user").await, 1);
        let cached = mock
            .cache()
            .find_one("user", &ResourceQuery::user("octocat").key)
            .await
            .unwrap()
            .unwrap();
        assert!(cached.get("stale").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_org_and_user_endpoints() {
        let mock = MockGithub::new();
        mock.org("acme", &["alice"]);
        mock.user("alice");
        mock.org_repos("acme", &[repo_json("acme", "rocket", OwnerKind::Organization)]);
        mock.user_repos("alice", &[fork_json("alice", "rocket", "acme/rocket")]);
        let mut github = mock.accessor().await.unwrap();

        assert!(github.is_organisation("acme").await.unwrap());
        assert!(!github.is_user("acme").await.unwrap());
        assert!(github.is_user("alice").await.unwrap());

        let org_repos = github.get_repo_list("acme").await.unwrap().unwrap();
        assert_eq!(
            org_repos,
            vec![json!({
                "login": "acme",
                "name": "rocket",
                "full_name": "acme/rocket",
                "fork": false
            })]
        );
        let user_repos = github.get_repo_list("alice").await.unwrap().unwrap();
        assert_eq!(user_repos[0]["fork"], true);

        let members = github.get_organisation_members("acme").await.unwrap().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["login"], "alice");
        assert!(github.get_organisation_members("alice").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_repos_skips_missing() {
        let mock = MockGithub::new();
        mock.user("alice");
        mock.repo(repo_json("alice", "present", OwnerKind::User));
        mock.user_repos(
            "alice",
            &[
                repo_json("alice", "present", OwnerKind::User),
                repo_json("alice", "deleted", OwnerKind::User),
            ],
        );
        let mut github = mock.accessor().await.unwrap();

        let repos = github.get_repos("alice").await.unwrap().unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0]["full_name"], "alice/present");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_and_contributors() {
        let mock = MockGithub::new();
        mock.user("alice");
        mock.user_events("alice", &[event_json("PushEvent", "alice/hello")]);
        mock.contributors("alice/hello", &[("alice", 3), ("bob", 1)]);
        let mut github = mock.accessor().await.unwrap();

        let events = github.get_events("alice").await.unwrap().unwrap();
        assert!(events[0].get("actor").is_none());

        let contributors = github
            .get_repo_contributors("alice/hello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[1]["contributions"], 1);
        assert!(contributors[0].get("avatar_url").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache() {
        let mock = MockGithub::new();
        mock.user("a");
        mock.user("b");
        let mut github = mock.accessor().await.unwrap();
        github.get_user("a").await.unwrap();
        github.get_user("b").await.unwrap();
        assert_eq!(mock.cache().record_count("user").await, 2);

        let removed = github
            .clear_cache(Table::User, Some(&ResourceQuery::user("a").key))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        github.clear_cache(Table::User, None).await.unwrap();
        assert_eq!(mock.cache().record_count("user").await, 0);
    }
}
