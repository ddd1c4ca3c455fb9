//! Document cache for API resources.
//!
//! Records live in named tables and are addressed by a structured key: a JSON
//! object of key fields such as `{"login": "octocat", "name": "hello"}`. A
//! record matches a key when every key field is present and equal.
//!
//! Two stores are provided: [`MemoryCache`] for a single process and
//! [`JsonFileCache`], which keeps one JSON file per table on disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

/// Key fields identifying a cached record.
pub type Key = Map<String, Value>;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Version mismatch in {table}: expected {expected}, found {found}")]
    VersionMismatch {
        table: String,
        expected: u32,
        found: u32,
    },
}

/// An opaque key-value document store.
///
/// Each operation is atomic on its own; nothing spans records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Point lookup of the first record matching `key`.
    async fn find_one(&self, table: &str, key: &Key) -> Result<Option<Value>, CacheError>;

    async fn insert(&self, table: &str, record: &Value) -> Result<(), CacheError>;

    /// Replace the first record matching `key`. Returns whether one matched.
    async fn replace_one(&self, table: &str, key: &Key, record: &Value)
        -> Result<bool, CacheError>;

    /// Delete every record matching `filter`. Returns how many went.
    async fn delete_many(&self, table: &str, filter: &Key) -> Result<usize, CacheError>;

    async fn drop_table(&self, table: &str) -> Result<(), CacheError>;

    /// Replace the record matching `key`, or insert it if there is none.
    async fn upsert(&self, table: &str, key: &Key, record: &Value) -> Result<(), CacheError> {
        if self.replace_one(table, key, record).await? {
            info!(table, ?key, "replace-cache");
            return Ok(());
        }
        info!(table, ?key, "store-cache");
        self.insert(table, record).await
    }
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    async fn find_one(&self, table: &str, key: &Key) -> Result<Option<Value>, CacheError> {
        (**self).find_one(table, key).await
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<(), CacheError> {
        (**self).insert(table, record).await
    }

    async fn replace_one(
        &self,
        table: &str,
        key: &Key,
        record: &Value,
    ) -> Result<bool, CacheError> {
        (**self).replace_one(table, key, record).await
    }

    async fn delete_many(&self, table: &str, filter: &Key) -> Result<usize, CacheError> {
        (**self).delete_many(table, filter).await
    }

    async fn drop_table(&self, table: &str) -> Result<(), CacheError> {
        (**self).drop_table(table).await
    }
}

/// Whether `record` carries every field of `key` with an equal value.
pub fn matches(record: &Value, key: &Key) -> bool {
    key.iter().all(|(field, expected)| record.get(field) == Some(expected))
}

fn replace_in(records: &mut [Value], key: &Key, record: &Value) -> bool {
    match records.iter_mut().find(|r| matches(r, key)) {
        Some(slot) => {
            *slot = record.clone();
            true
        }
        None => false,
    }
}

fn delete_in(records: &mut Vec<Value>, filter: &Key) -> usize {
    let before = records.len();
    records.retain(|r| !matches(r, filter));
    before - records.len()
}

// ============================================================================
// In-memory store
// ============================================================================

/// A cache that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `table`.
    pub async fn record_count(&self, table: &str) -> usize {
        self.tables.lock().await.get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn find_one(&self, table: &str, key: &Key) -> Result<Option<Value>, CacheError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .and_then(|records| records.iter().find(|r| matches(r, key)))
            .cloned())
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<(), CacheError> {
        let mut tables = self.tables.lock().await;
        tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn replace_one(
        &self,
        table: &str,
        key: &Key,
        record: &Value,
    ) -> Result<bool, CacheError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .get_mut(table)
            .is_some_and(|records| replace_in(records, key, record)))
    }

    async fn delete_many(&self, table: &str, filter: &Key) -> Result<usize, CacheError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .get_mut(table)
            .map_or(0, |records| delete_in(records, filter)))
    }

    async fn drop_table(&self, table: &str) -> Result<(), CacheError> {
        self.tables.lock().await.remove(table);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Current table file version.
const TABLE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    version: u32,
    records: Vec<Value>,
}

/// A cache persisted as one pretty-printed JSON file per table.
///
/// Tables are read on first use and rewritten after every change.
#[derive(Debug)]
pub struct JsonFileCache {
    dir: PathBuf,
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl JsonFileCache {
    /// Open (or create on first write) a cache under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> Result<PathBuf, CacheError> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CacheError::InvalidTable(table.to_string()));
        }
        Ok(self.dir.join(format!("{table}.json")))
    }

    async fn load(&self, table: &str) -> Result<Vec<Value>, CacheError> {
        let path = self.table_path(table)?;
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        let file: TableFile = serde_json::from_str(&content)?;
        if file.version != TABLE_VERSION {
            return Err(CacheError::VersionMismatch {
                table: table.to_string(),
                expected: TABLE_VERSION,
                found: file.version,
            });
        }
        Ok(file.records)
    }

    async fn save(&self, table: &str, records: &[Value]) -> Result<(), CacheError> {
        let path = self.table_path(table)?;
        fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(&TableFile {
            version: TABLE_VERSION,
            records: records.to_vec(),
        })?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Run `f` over the loaded records of `table`, persisting if it reports a change.
    async fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Vec<Value>) -> (T, bool),
    ) -> Result<T, CacheError> {
        let mut tables = self.tables.lock().await;
        if !tables.contains_key(table) {
            let records = self.load(table).await?;
            tables.insert(table.to_string(), records);
        }
        let records = tables.entry(table.to_string()).or_default();
        let (result, changed) = f(records);
        if changed {
            self.save(table, records).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl CacheStore for JsonFileCache {
    async fn find_one(&self, table: &str, key: &Key) -> Result<Option<Value>, CacheError> {
        self.with_table(table, |records| {
            (records.iter().find(|r| matches(r, key)).cloned(), false)
        })
        .await
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<(), CacheError> {
        self.with_table(table, |records| {
            records.push(record.clone());
            ((), true)
        })
        .await
    }

    async fn replace_one(
        &self,
        table: &str,
        key: &Key,
        record: &Value,
    ) -> Result<bool, CacheError> {
        self.with_table(table, |records| {
            let replaced = replace_in(records, key, record);
            (replaced, replaced)
        })
        .await
    }

    async fn delete_many(&self, table: &str, filter: &Key) -> Result<usize, CacheError> {
        self.with_table(table, |records| {
            let deleted = delete_in(records, filter);
            (deleted, deleted > 0)
        })
        .await
    }

    async fn drop_table(&self, table: &str) -> Result<(), CacheError> {
        let path = self.table_path(table)?;
        self.tables.lock().await.remove(table);
        if fs::try_exists(&path).await? {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}
