//! Crawl configuration.

/// Default number of relation hops followed from a seed entity.
const DEFAULT_FOLLOW_DEPTH: u32 = 1;

/// Configuration for one graph crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Relation hops to follow from an entity when no budget is given.
    pub follow_depth: u32,

    /// Whether forked repositories in an account's repository list are followed.
    pub follow_forks: bool,

    /// Whether cached records are read.
    pub use_cache: bool,

    /// Whether missing records are fetched from the API.
    pub use_network: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            follow_depth: DEFAULT_FOLLOW_DEPTH,
            follow_forks: false,
            use_cache: true,
            use_network: true,
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_depth(mut self, depth: u32) -> Self {
        self.follow_depth = depth;
        self
    }

    pub fn with_follow_forks(mut self, follow: bool) -> Self {
        self.follow_forks = follow;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_use_network(mut self, use_network: bool) -> Self {
        self.use_network = use_network;
        self
    }

    /// Only read what is already cached.
    pub fn offline(self) -> Self {
        self.with_use_cache(true).with_use_network(false)
    }
}
