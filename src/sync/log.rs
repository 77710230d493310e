//! Rolling sync log
//!
//! A fixed-size, newest-first history of sync attempts persisted under a
//! single storage key. Appends are best-effort at the call sites: a log
//! write failure never fails the sync that produced the entry.

use anyhow::Result;
use tracing::warn;

use crate::model::SyncLogEntry;
use crate::store::{KvStore, KvStoreExt, keys};

/// Maximum number of retained log entries
pub const SYNC_LOG_CAP: usize = 10;

/// Prepends an entry and rewrites the capped log.
pub async fn append(store: &dyn KvStore, entry: SyncLogEntry) -> Result<()> {
    let mut all = entries(store).await;
    all.insert(0, entry);
    all.truncate(SYNC_LOG_CAP);
    store.set_json(keys::SYNC_LOGS, &all).await
}

/// Reads the log, newest first. An unreadable record starts a fresh log
/// rather than poisoning every future sync.
pub async fn entries(store: &dyn KvStore) -> Vec<SyncLogEntry> {
    match store.get_json(keys::SYNC_LOGS).await {
        Ok(Some(all)) => all,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Sync log unreadable, starting fresh: {:#}", e);
            Vec::new()
        }
    }
}
