//! GitHub entity graph crawler.
//!
//! Crawls users, organisations and repositories outward from the given seeds
//! and writes the resulting graph as JSON.
//!
//! ```bash
//! cargo run -p ghgraph -- org:rust-lang --depth 2 --out rust-lang.json
//! ```
//!
//! Credentials are read from `GITHUB_USERNAME` and `GITHUB_TOKEN`, either in
//! the environment or in a `.env` file. Set `RUST_LOG` to adjust logging.

mod seed;

use clap::Parser;
use ghclient::{ClientConfig, Credentials, GithubClient};
use ghgraph_core::{CrawlConfig, Github, GraphBuilder, GraphView, JsonFileCache, Stats, Table};
use seed::Seed;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ghgraph")]
#[command(about = "Crawl GitHub into a user/organisation/repository graph", long_about = None)]
struct Cli {
    /// Entities to start from: user:<login>, org:<login>, repo:<owner>/<name>,
    /// or a bare login or full name
    #[arg(required_unless_present = "clear")]
    seeds: Vec<Seed>,

    /// Relationship hops to follow from each seed
    #[arg(short, long)]
    depth: Option<u32>,

    /// Also follow repositories that are forks
    #[arg(long)]
    follow_forks: bool,

    /// Only use cached data
    #[arg(long, conflicts_with = "no_cache")]
    offline: bool,

    /// Ignore cached data (fetched data is still stored)
    #[arg(long)]
    no_cache: bool,

    /// Cache directory
    #[arg(long, default_value = ".ghgraph-cache")]
    cache_dir: PathBuf,

    /// Where to write the graph
    #[arg(short, long, default_value = "graph.json")]
    out: PathBuf,

    /// Request budget per hour
    #[arg(long, default_value_t = ghclient::DEFAULT_REQUESTS_PER_HOUR)]
    requests_per_hour: u32,

    /// Drop a cache table before crawling (repeatable)
    #[arg(long, value_name = "TABLE")]
    clear: Vec<Table>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut crawl = CrawlConfig::new()
        .with_follow_forks(cli.follow_forks)
        .with_use_cache(!cli.no_cache);
    if let Some(depth) = cli.depth {
        crawl = crawl.with_follow_depth(depth);
    }
    if cli.offline {
        crawl = crawl.offline();
    }

    let client = if crawl.use_network {
        Some(connect(cli.requests_per_hour).await?)
    } else {
        None
    };

    let cache = JsonFileCache::open(&cli.cache_dir);
    let github = Github::from_config(&crawl, Box::new(cache), client);

    for table in &cli.clear {
        github.clear_cache(*table, None).await?;
        info!(%table, "cache table cleared");
    }
    if cli.seeds.is_empty() {
        return Ok(());
    }

    let mut builder = GraphBuilder::new(github, crawl);
    for seed in &cli.seeds {
        match seed.crawl(&mut builder, cli.depth).await? {
            Some(id) => info!(%seed, node = %id, "seed crawled"),
            None => warn!(%seed, "seed not found"),
        }
    }

    let graph = builder.into_graph();
    GraphView::from(&graph).write_json(&cli.out).await?;

    for stats in Stats::from_graph(&graph) {
        if stats.count() > 0 {
            println!("{stats}");
        }
    }
    println!(
        "{} nodes, {} edges written to {}",
        graph.node_count(),
        graph.edge_count(),
        cli.out.display()
    );
    Ok(())
}

/// Log in if credentials are configured; otherwise crawl anonymously.
async fn connect(requests_per_hour: u32) -> Result<GithubClient, ghclient::Error> {
    let mut config = ClientConfig::new().with_requests_per_hour(requests_per_hour);
    match Credentials::from_env() {
        Ok(credentials) => config = config.with_credentials(credentials),
        Err(_) => warn!("GITHUB_USERNAME/GITHUB_TOKEN not set, crawling anonymously"),
    }
    GithubClient::connect(config).await
}
