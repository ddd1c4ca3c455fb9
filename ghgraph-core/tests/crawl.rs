//! End-to-end crawls against a scripted GitHub.
//!
//! Each test scripts a small ecosystem on a mock transport, crawls it with a
//! real accessor and cache, and checks the resulting graph.

use ghclient::testing::MockTransport;
use ghclient::{ClientConfig, GithubClient, RawResponse};
use ghgraph_core::graph::OwnerKind;
use ghgraph_core::testing::{event_json, fork_json, org_json, repo_json, user_json};
use ghgraph_core::{
    CacheStore, CrawlConfig, EdgeKind, Github, Graph, GraphBuilder, GraphView, JsonFileCache,
    MockGithub, NodeId, Stats, Table,
};
use serde_json::json;
use std::collections::BTreeSet;

/// An organisation with two members, a repository each, a fork and some
/// activity.
fn ecosystem() -> MockGithub {
    let mock = MockGithub::new();
    mock.org("acme", &["alice", "bob"]);
    mock.user("alice");
    mock.user("bob");
    mock.org_repos(
        "acme",
        &[
            repo_json("acme", "rocket", OwnerKind::Organization),
            repo_json("acme", "anvil", OwnerKind::Organization),
        ],
    );
    mock.repo(repo_json("acme", "rocket", OwnerKind::Organization));
    mock.repo(repo_json("acme", "anvil", OwnerKind::Organization));
    mock.contributors("acme/rocket", &[("alice", 8), ("bob", 2)]);
    mock.contributors("acme/anvil", &[("bob", 1)]);
    mock.org_events("acme", &[event_json("PushEvent", "acme/rocket")]);

    mock.user_repos(
        "alice",
        &[
            repo_json("alice", "dotfiles", OwnerKind::User),
            fork_json("alice", "serde", "serde-rs/serde"),
        ],
    );
    mock.repo(repo_json("alice", "dotfiles", OwnerKind::User));
    mock.repo(fork_json("alice", "serde", "serde-rs/serde"));
    mock.repo(repo_json("serde-rs", "serde", OwnerKind::Organization));
    mock.user_events(
        "alice",
        &[
            event_json("PushEvent", "alice/serde"),
            event_json("IssueCommentEvent", "tokio-rs/tokio"),
        ],
    );
    mock
}

fn node_ids(graph: &Graph) -> BTreeSet<String> {
    graph.nodes().map(|n| n.id().to_string()).collect()
}

fn edge_summary(graph: &Graph) -> BTreeSet<String> {
    graph.edges().map(ToString::to_string).collect()
}

#[tokio::test(start_paused = true)]
async fn test_org_crawl_depth_two() {
    let mock = ecosystem();
    let mut builder = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());

    let seed = builder.add_user_or_org("acme", Some(2)).await.unwrap();
    assert_eq!(seed, Some(NodeId::organisation("acme")));

    let graph = builder.graph();
    let acme = NodeId::organisation("acme");
    let rocket = NodeId::repository("acme/rocket");
    let alice = NodeId::user("alice");
    let bob = NodeId::user("bob");

    for id in [&acme, &rocket, &alice, &bob, &NodeId::repository("acme/anvil")] {
        assert!(graph.contains(id), "missing {id}");
    }
    assert!(graph.node(&acme).unwrap().is_organisation());

    assert!(graph.edge(&alice, &acme).unwrap().is_member());
    assert!(graph.edge(&acme, &rocket).unwrap().is_owner());
    assert_eq!(graph.edge(&alice, &rocket).unwrap().strength, 0.8);
    assert!((graph.edge(&bob, &rocket).unwrap().strength - 0.2).abs() < 1e-9);

    // members are expanded with one hop left
    let dotfiles = NodeId::repository("alice/dotfiles");
    assert!(graph.edge(&alice, &dotfiles).unwrap().is_owner());

    // the fork is skipped in alice's repository list but reached through a
    // push event, as a leaf carrying the upstream record
    let fork = NodeId::repository("alice/serde");
    let pushed = graph.edge(&alice, &fork).unwrap();
    assert!(pushed.has_kind(EdgeKind::PushedTo));
    assert!(!pushed.has_kind(EdgeKind::Forked));
    assert_eq!(graph.node(&fork).unwrap().payload()["full_name"], "serde-rs/serde");
    assert!(!graph.contains(&NodeId::organisation("serde-rs")));
    assert!(graph.node(&NodeId::repository("tokio-rs/tokio")).unwrap().is_error());
}

#[tokio::test(start_paused = true)]
async fn test_event_reference_to_fork_uses_upstream() {
    let mock = ecosystem();
    let mut builder = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());

    builder.add_user("alice", Some(2)).await.unwrap();
    let graph = builder.graph();
    let alice = NodeId::user("alice");

    let fork = graph.node(&NodeId::repository("alice/serde")).unwrap();
    assert_eq!(fork.payload()["full_name"], "serde-rs/serde");
    assert!(graph
        .edge(&alice, &NodeId::repository("alice/serde"))
        .unwrap()
        .has_kind(EdgeKind::PushedTo));

    let missing = graph.node(&NodeId::repository("tokio-rs/tokio")).unwrap();
    assert!(missing.is_error());
}

#[tokio::test(start_paused = true)]
async fn test_offline_rebuild_matches_online_crawl() {
    let mock = ecosystem();
    let mut online = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());
    online.add_organisation("acme", Some(2)).await.unwrap();
    let requests = mock.transport().request_count();
    assert!(requests > 0);

    let mut offline = GraphBuilder::new(mock.offline_accessor(), CrawlConfig::new().offline());
    offline.add_organisation("acme", Some(2)).await.unwrap();

    assert_eq!(mock.transport().request_count(), requests);
    assert_eq!(node_ids(online.graph()), node_ids(offline.graph()));
    assert_eq!(edge_summary(online.graph()), edge_summary(offline.graph()));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_cache_refetches() {
    let mock = ecosystem();
    let mut first = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());
    first.add_user("bob", Some(1)).await.unwrap();
    let bob_url = MockGithub::url("users/bob");
    assert_eq!(mock.transport().requests_to(&bob_url), 1);

    let github = mock.accessor().await.unwrap().with_use_cache(false);
    let mut second = GraphBuilder::new(github, CrawlConfig::new());
    second.add_user("bob", Some(1)).await.unwrap();
    assert_eq!(mock.transport().requests_to(&bob_url), 2);

    let mut third = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());
    third.add_user("bob", Some(1)).await.unwrap();
    assert_eq!(mock.transport().requests_to(&bob_url), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let mock = MockGithub::new();
    let mut builder = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());
    assert_eq!(builder.add_user("ghost", None).await.unwrap(), None);
    assert_eq!(mock.cache().record_count(Table::User.name()).await, 0);

    // the user appears later and is picked up
    mock.user("ghost");
    assert_eq!(
        builder.add_user("ghost", Some(0)).await.unwrap(),
        Some(NodeId::user("ghost"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_paginated_members() {
    let transport = MockTransport::new();
    let base = ClientConfig::default().base_url;
    let members = format!("{base}orgs/acme/members");
    let page_two = format!("{members}?page=2");

    transport.respond_json(&format!("{base}orgs/acme"), org_json("acme"));
    transport.respond(
        &members,
        RawResponse::json(200, &json!([user_json("alice")]))
            .with_link(format!("<{page_two}>; rel=\"next\", <{page_two}>; rel=\"last\"")),
    );
    transport.respond_json(&page_two, json!([user_json("bob")]));
    transport.respond_json(&format!("{base}users/alice"), user_json("alice"));
    transport.respond_json(&format!("{base}users/bob"), user_json("bob"));

    let config = ClientConfig::new().with_requests_per_hour(3_600_000);
    let client = GithubClient::with_transport(Box::new(transport.clone()), config)
        .await
        .unwrap();
    let cache = ghgraph_core::MemoryCache::new();
    let github = Github::new(Box::new(cache), Some(client));
    let mut builder = GraphBuilder::new(github, CrawlConfig::new());

    builder.add_organisation("acme", Some(1)).await.unwrap();
    let acme = NodeId::organisation("acme");
    let graph = builder.graph();
    assert_eq!(graph.edges_in(&acme).len(), 2);
    assert!(graph.edge(&NodeId::user("bob"), &acme).unwrap().is_member());
}

#[tokio::test(start_paused = true)]
async fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mock = ecosystem();

    let config = ClientConfig::new().with_requests_per_hour(3_600_000);
    let client = GithubClient::with_transport(Box::new(mock.transport().clone()), config)
        .await
        .unwrap();
    let github = Github::new(Box::new(JsonFileCache::open(dir.path())), Some(client));
    let mut online = GraphBuilder::new(github, CrawlConfig::new());
    online.add_organisation("acme", Some(1)).await.unwrap();

    let cache = JsonFileCache::open(dir.path());
    assert!(cache
        .find_one(Table::Org.name(), &ghgraph_core::ResourceQuery::org("acme").key)
        .await
        .unwrap()
        .is_some());

    let github = Github::new(Box::new(cache), None);
    let mut offline = GraphBuilder::new(github, CrawlConfig::new().offline());
    offline.add_organisation("acme", Some(1)).await.unwrap();
    assert_eq!(node_ids(online.graph()), node_ids(offline.graph()));
}

#[tokio::test(start_paused = true)]
async fn test_view_and_stats_of_crawl() {
    let mock = ecosystem();
    let mut builder = GraphBuilder::new(mock.accessor().await.unwrap(), CrawlConfig::new());
    builder.add_organisation("acme", Some(1)).await.unwrap();
    let graph = builder.into_graph();

    let view = GraphView::from(&graph);
    assert_eq!(view.nodes.len(), graph.node_count());
    assert_eq!(view.edges.len(), graph.edge_count());
    let total_degree: usize = view.nodes.iter().map(|n| n.degree).sum();
    assert_eq!(total_degree, 2 * graph.edge_count());

    let [repos, users, orgs] = Stats::from_graph(&graph);
    assert_eq!(repos.count(), 2);
    assert_eq!(repos.sum("stargazers_count"), Some(6));
    assert_eq!(users.count(), 2);
    assert_eq!(orgs.count(), 1);
    assert!(orgs.to_string().starts_with("organisations\n"));
}
