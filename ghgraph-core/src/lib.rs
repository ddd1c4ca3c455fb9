//! Cache-backed GitHub crawler that builds entity graphs.
//!
//! This crate provides:
//! - A read-through accessor for users, organisations, repositories, events,
//!   members and contributors, backed by a pluggable cache
//! - A typed graph of those entities with weighted, merged edges
//! - A bounded-depth builder that crawls outward from seed entities
//! - A serializable view and summary statistics for rendering
//!
//! # Quick Start
//!
//! ```ignore
//! use ghclient::{ClientConfig, Credentials, GithubClient};
//! use ghgraph_core::{CrawlConfig, Github, GraphBuilder, GraphView, JsonFileCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new().with_credentials(Credentials::from_env()?);
//!     let client = GithubClient::connect(config).await?;
//!     let cache = JsonFileCache::open(".ghgraph-cache");
//!
//!     let crawl = CrawlConfig::new().with_follow_depth(2);
//!     let github = Github::from_config(&crawl, Box::new(cache), Some(client));
//!     let mut builder = GraphBuilder::new(github, crawl);
//!     builder.add_user_or_org("rust-lang", None).await?;
//!
//!     GraphView::from(builder.graph()).write_json("graph.json").await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod builder;
pub mod cache;
pub mod config;
pub mod graph;
pub mod stats;
pub mod testing;
pub mod view;

// Primary public API
pub use api::{ApiError, Github, ResourceQuery, Table};
pub use builder::{BuildError, GraphBuilder};
pub use cache::{CacheError, CacheStore, JsonFileCache, Key, MemoryCache};
pub use config::CrawlConfig;
pub use graph::{Edge, EdgeKind, Graph, Node, NodeId, NodeKind};
pub use stats::{Aggregate, Stats};
pub use testing::MockGithub;
pub use view::{EdgeView, GraphView, NodeView, ViewError};
