//! Key-value storage contract
//!
//! The sync engine only ever sees this trait; the concrete backend (memory
//! or file) is picked once at startup and injected. Values are JSON strings,
//! with typed helpers layered on top as an extension trait.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

// Sub-modules
pub mod file;
pub mod memory;

// Re-exports
pub use file::FileStore;
pub use memory::MemoryStore;

// ============================================================================
// Well-Known Keys
// ============================================================================

/// Keys the sync engine reads and writes
pub mod keys {
    /// Last successful global sync result
    pub const SYNC_RESULT: &str = "sync:result";

    /// Rolling sync log, newest first
    pub const SYNC_LOGS: &str = "sync:logs";

    /// Auto-sync configuration record
    pub const CONFIG_AUTO_SYNC: &str = "config:auto_sync";

    /// Stored upstream configuration record
    pub const CONFIG_SUBSTORE: &str = "config:substore";

    /// Prefix shared by all user records
    pub const USER_PREFIX: &str = "user:";

    /// Key of one user record
    pub fn user(username: &str) -> String {
        format!("{}{}", USER_PREFIX, username)
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Object-safe async key-value store.
///
/// Implementations honor the optional TTL lazily: an expired entry behaves
/// as absent on `get_raw` and `list`. There are no cross-key transactions;
/// concurrent writers to the same key are last-writer-wins.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the raw value at `key`, `None` when absent or expired
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, with an optional time-to-live
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Remove the entry at `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// All live keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Typed JSON helpers over any [`KvStore`]
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Read and deserialize the record at `key`
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Malformed record at key '{}'", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize and write a record at `key`
    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize record for key '{}'", key))?;
        self.set_raw(key, raw, None).await
    }

    /// Serialize and write a record at `key` with a time-to-live
    async fn set_json_ttl<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize record for key '{}'", key))?;
        self.set_raw(key, raw, Some(ttl)).await
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
