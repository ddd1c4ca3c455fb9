//! Crawl seeds given on the command line.

use ghgraph_core::{BuildError, GraphBuilder, NodeId};
use std::fmt;
use std::str::FromStr;

/// An entity to start crawling from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    User(String),
    Organisation(String),
    Repository(String),
    /// A bare login; resolved as an organisation if it is one.
    Account(String),
}

impl FromStr for Seed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, value) = match s.split_once(':') {
            Some((prefix, value)) => (Some(prefix), value),
            None => (None, s),
        };
        if value.is_empty() {
            return Err(format!("empty seed: {s:?}"));
        }
        let value = value.to_string();
        match prefix {
            Some("user" | "u") => Ok(Seed::User(value)),
            Some("org" | "o") => Ok(Seed::Organisation(value)),
            Some("repo" | "r") => Ok(Seed::Repository(value)),
            Some(other) => Err(format!("unknown seed kind {other:?}, expected user, org or repo")),
            None if value.contains('/') => Ok(Seed::Repository(value)),
            None => Ok(Seed::Account(value)),
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::User(login) => write!(f, "user:{login}"),
            Seed::Organisation(login) => write!(f, "org:{login}"),
            Seed::Repository(full_name) => write!(f, "repo:{full_name}"),
            Seed::Account(login) => f.write_str(login),
        }
    }
}

impl Seed {
    /// Crawl from this seed. `None` if the entity does not exist.
    pub async fn crawl(
        &self,
        builder: &mut GraphBuilder,
        depth: Option<u32>,
    ) -> Result<Option<NodeId>, BuildError> {
        match self {
            Seed::User(login) => builder.add_user(login, depth).await,
            Seed::Organisation(login) => builder.add_organisation(login, depth).await,
            Seed::Repository(full_name) => builder.add_repo(full_name, depth).await,
            Seed::Account(login) => builder.add_user_or_org(login, depth).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seeds() {
        assert_eq!("user:octocat".parse(), Ok(Seed::User("octocat".into())));
        assert_eq!("org:rust-lang".parse(), Ok(Seed::Organisation("rust-lang".into())));
        assert_eq!("repo:a/b".parse(), Ok(Seed::Repository("a/b".into())));
        assert_eq!("a/b".parse(), Ok(Seed::Repository("a/b".into())));
        assert_eq!("octocat".parse(), Ok(Seed::Account("octocat".into())));
        assert!("team:x".parse::<Seed>().is_err());
        assert!("user:".parse::<Seed>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for seed in ["user:a", "org:b", "repo:c/d", "e"] {
            assert_eq!(seed.parse::<Seed>().unwrap().to_string(), seed);
        }
    }
}
