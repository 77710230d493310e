//! File-backed store backend
//!
//! Holds the whole keyspace as one JSON document on disk and rewrites it on
//! every mutation. Suits the small record set this service keeps; anything
//! bigger belongs behind a real database implementation of the same trait.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::KvStore;

#[derive(Serialize, Deserialize, Clone, Debug)]
struct PersistedEntry {
    value: String,

    /// Wall-clock deadline so TTLs survive restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl PersistedEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Utc::now() >= deadline)
    }
}

/// [`KvStore`] persisted as a single JSON document
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, PersistedEntry>>,
}

impl FileStore {
    /// Open the store at `path`, creating an empty one when the file does
    /// not exist yet. A file that exists but cannot be parsed is an error,
    /// never silently discarded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read store file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store file: {}", path.display()))?
        } else {
            debug!("Store file {} does not exist yet, starting empty", path.display());
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, PersistedEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize store contents")?;

        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write store file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        // Expired entries are only physically removed on the next write
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                Some(Utc::now() + chrono::Duration::from_std(ttl).context("TTL out of range")?)
            }
            None => None,
        };

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(key.to_string(), PersistedEntry { value, expires_at });
        self.persist(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.remove(key);
        self.persist(&entries).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
