//! Summary statistics over entity payloads.

use crate::graph::{Graph, NodeKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// How a field is aggregated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Aggregate {
    /// Numeric field; values are summed, missing values count as zero.
    Sum(u64),
    /// Text field; every object's value is collected.
    Values(Vec<String>),
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Sum(n) => write!(f, "{n}"),
            Aggregate::Values(values) if values.len() == 1 => f.write_str(&values[0]),
            Aggregate::Values(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// Aggregates a fixed set of fields over payloads of one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    name: String,
    count: usize,
    fields: BTreeMap<String, Aggregate>,
}

const REPOSITORY_SUMS: &[&str] = &[
    "stargazers_count",
    "open_issues_count",
    "watchers_count",
    "forks_count",
    "size",
];

const ORGANISATION_TEXT: &[&str] = &[
    "name",
    "url",
    "location",
    "blog",
    "description",
    "created_at",
    "updated_at",
];
const ORGANISATION_SUMS: &[&str] = &["public_repos", "followers", "following", "public_gists"];

const USER_TEXT: &[&str] = &[
    "name",
    "url",
    "location",
    "company",
    "bio",
    "blog",
    "created_at",
    "updated_at",
];
const USER_SUMS: &[&str] = &["followers", "following", "public_repos"];

impl Stats {
    pub fn new(name: impl Into<String>, sums: &[&str], text: &[&str]) -> Self {
        let mut fields = BTreeMap::new();
        for key in sums {
            fields.insert(key.to_string(), Aggregate::Sum(0));
        }
        for key in text {
            fields.insert(key.to_string(), Aggregate::Values(Vec::new()));
        }
        Self {
            name: name.into(),
            count: 0,
            fields,
        }
    }

    pub fn repositories() -> Self {
        Self::new("repositories", REPOSITORY_SUMS, &[])
    }

    pub fn organisations() -> Self {
        Self::new("organisations", ORGANISATION_SUMS, ORGANISATION_TEXT)
    }

    pub fn users() -> Self {
        Self::new("users", USER_SUMS, USER_TEXT)
    }

    /// Repository, user and organisation statistics over a graph's nodes.
    /// Error placeholders are left out.
    pub fn from_graph(graph: &Graph) -> [Stats; 3] {
        let mut repos = Self::repositories();
        let mut users = Self::users();
        let mut orgs = Self::organisations();
        for node in graph.nodes().filter(|n| !n.is_error()) {
            match node.kind() {
                NodeKind::Repository => repos.add_object(node.payload()),
                NodeKind::User => users.add_object(node.payload()),
                NodeKind::Organisation => orgs.add_object(node.payload()),
            }
        }
        [repos, users, orgs]
    }

    pub fn add_object(&mut self, object: &Value) {
        self.count += 1;
        for (key, aggregate) in self.fields.iter_mut() {
            let value = object.get(key);
            match aggregate {
                Aggregate::Sum(total) => {
                    *total += value.and_then(Value::as_u64).unwrap_or(0);
                }
                Aggregate::Values(values) => match value {
                    Some(Value::String(s)) => values.push(s.clone()),
                    Some(Value::Null) | None => {}
                    Some(other) => values.push(other.to_string()),
                },
            }
        }
    }

    pub fn add_objects<'a>(&mut self, objects: impl IntoIterator<Item = &'a Value>) {
        for object in objects {
            self.add_object(object);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of objects aggregated.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn get(&self, key: &str) -> Option<&Aggregate> {
        self.fields.get(key)
    }

    /// Summed value of a numeric field.
    pub fn sum(&self, key: &str) -> Option<u64> {
        match self.fields.get(key) {
            Some(Aggregate::Sum(n)) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count > 1 {
            writeln!(f, "num {}: {}", self.name, self.count)?;
        } else {
            writeln!(f, "{}", self.name)?;
        }
        for (key, aggregate) in &self.fields {
            writeln!(f, "{key:>20}: {aggregate}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{repo_json, user_json};
    use crate::graph::OwnerKind;
    use serde_json::json;

    #[test]
    fn test_repository_sums() {
        let mut stats = Stats::repositories();
        stats.add_objects(&[
            repo_json("a", "one", OwnerKind::User),
            repo_json("a", "two", OwnerKind::User),
            json!({"full_name": "x/y"}),
        ]);
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.sum("stargazers_count"), Some(6));
        assert_eq!(stats.sum("size"), Some(200));
        assert_eq!(stats.sum("name"), None);
    }

    #[test]
    fn test_text_fields_collected() {
        let mut stats = Stats::users();
        stats.add_object(&user_json("alice"));
        stats.add_object(&json!({"login": "bob", "name": null, "location": "Mars"}));

        assert_eq!(
            stats.get("location"),
            Some(&Aggregate::Values(vec!["Earth".into(), "Mars".into()]))
        );
        assert_eq!(stats.get("name"), Some(&Aggregate::Values(vec!["ALICE".into()])));
        assert_eq!(stats.sum("followers"), Some(10));
    }

    #[test]
    fn test_display_table() {
        let mut stats = Stats::new("things", &["size"], &["name"]);
        stats.add_object(&json!({"size": 4, "name": "first"}));
        assert_eq!(
            stats.to_string(),
            format!("things\n{:>20}: first\n{:>20}: 4\n", "name", "size")
        );

        stats.add_object(&json!({"size": 1, "name": "second"}));
        let table = stats.to_string();
        assert!(table.starts_with("num things: 2\n"));
        assert!(table.contains("[first, second]"));
        assert!(table.contains(&format!("{:>20}: 5", "size")));
    }
}
