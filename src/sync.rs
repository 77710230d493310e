//! Sync engine
//!
//! Orchestrates fetch, decode, classify and aggregate for three call
//! shapes: the global collection, one user's binding, and every bound user
//! in bulk. Entry points never return `Err`: each failure path collapses
//! into a structured outcome, and stored results are only overwritten by a
//! successful sync.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::fetch::{SubStoreClient, normalize_base_url};
use crate::model::{
    AutoSyncConfig, BulkSyncOutcome, Collection, GlobalSyncOutcome, SubStoreConfig,
    SubscriptionBinding, SyncLogEntry, SyncResult, Token, User, UserSyncOutcome, UserSyncResult,
};
use crate::parser::{days_remaining_to_date, extract_expire_date};
use crate::settings::Settings;
use crate::store::{KvStore, KvStoreExt, keys};

// Sub-modules
pub mod aggregate;
pub mod log;

// Re-exports
pub use aggregate::{NodeStats, aggregate};

// ============================================================================
// Engine
// ============================================================================

/// All sync and user-management operations over one injected store.
///
/// Holds no global state; construct as many engines as there are stores.
pub struct SyncEngine {
    store: Arc<dyn KvStore>,
    client: SubStoreClient,
    settings: Settings,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn KvStore>, client: SubStoreClient, settings: Settings) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    /// The injected store, for read-only collaborators
    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    // ========================================================================
    // Upstream Resolution
    // ========================================================================

    /// Resolve the upstream base URL: a stored `config:substore` record wins
    /// over the process configuration. Returns `None` when neither is set.
    pub async fn resolve_base_url(&self) -> Result<Option<String>> {
        let stored: Option<SubStoreConfig> = self.store.get_json(keys::CONFIG_SUBSTORE).await?;
        let configured = stored
            .as_ref()
            .and_then(|config| config.base_url.clone())
            .or_else(|| self.settings.substore_url.clone());
        match configured {
            Some(raw) => Ok(Some(normalize_base_url(&raw)?)),
            None => Ok(None),
        }
    }

    /// Resolve the backend path prefix, same precedence as the base URL
    pub async fn resolve_backend_prefix(&self) -> Result<String> {
        let stored: Option<SubStoreConfig> = self.store.get_json(keys::CONFIG_SUBSTORE).await?;
        Ok(stored
            .and_then(|config| config.backend_prefix)
            .unwrap_or_else(|| self.settings.backend_prefix.clone()))
    }

    async fn require_base_url(&self) -> Result<String> {
        self.resolve_base_url()
            .await?
            .ok_or_else(|| anyhow!("No Sub-Store URL configured"))
    }

    // ========================================================================
    // Global Sync
    // ========================================================================

    /// Sync the global collection.
    ///
    /// On failure the previous `sync:result` record is left untouched and a
    /// failure entry is appended to the log.
    pub async fn sync_global(&self) -> GlobalSyncOutcome {
        info!("Starting global sync");
        match self.run_global_sync().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!("Global sync failed: {}", message);
                self.append_log(SyncLogEntry::failure(message.as_str())).await;
                GlobalSyncOutcome::failure(message)
            }
        }
    }

    async fn run_global_sync(&self) -> Result<GlobalSyncOutcome> {
        let base_url = self.require_base_url().await?;
        let collection = self
            .settings
            .collection
            .clone()
            .ok_or_else(|| anyhow!("No global collection configured"))?;
        let token = self
            .settings
            .token
            .clone()
            .ok_or_else(|| anyhow!("No global share token configured"))?;

        let content = self
            .client
            .download_share(&base_url, &collection, &token)
            .await?;
        let stats = aggregate(&content, extract_expire_date);
        debug!(
            "Aggregated {} nodes, {} rejected lines",
            stats.node_count, stats.invalid_lines
        );

        let result = SyncResult {
            last_sync: Utc::now().to_rfc3339(),
            node_count: stats.node_count,
            earliest_expire: stats.earliest_expire.clone(),
            total_remain_gb: stats.total_remain_gb,
            raw_lines: stats.raw_lines.clone(),
            protocols: stats.protocols.clone(),
        };
        self.store
            .set_json(keys::SYNC_RESULT, &result)
            .await
            .context("Failed to persist sync result")?;
        self.append_log(SyncLogEntry::success(stats.node_count)).await;

        info!(
            "Global sync complete: {} nodes ({})",
            stats.node_count, stats.protocols
        );
        Ok(GlobalSyncOutcome {
            success: true,
            node_count: Some(stats.node_count),
            earliest_expire: stats.earliest_expire,
            total_remain_gb: stats.total_remain_gb,
            invalid_lines: Some(stats.invalid_lines),
            error: None,
        })
    }

    // ========================================================================
    // User Sync
    // ========================================================================

    /// Sync one user's bound share and embed the result in the user record.
    pub async fn sync_user(&self, username: &str) -> UserSyncOutcome {
        info!("Starting sync for user '{}'", username);
        match self.run_user_sync(username).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!("Sync for user '{}' failed: {}", username, message);
                UserSyncOutcome::failure(message)
            }
        }
    }

    async fn run_user_sync(&self, username: &str) -> Result<UserSyncOutcome> {
        let key = keys::user(username);
        let user: Option<User> = self.store.get_json(&key).await?;
        let Some(mut user) = user else {
            bail!("Unknown user '{}'", username);
        };
        let Some(binding) = user.binding.clone() else {
            bail!("User '{}' has no subscription binding", username);
        };

        let base_url = self.require_base_url().await?;
        let content = self
            .client
            .download_share(&base_url, &binding.collection, &binding.token)
            .await?;

        // Per-user shares label expiry as a day countdown rather than an
        // absolute date; the conversion anchors to the current UTC day.
        let today = Utc::now().date_naive();
        let stats = aggregate(&content, move |label| days_remaining_to_date(label, today));

        let node_count = stats.node_count;
        user.last_sync_result = Some(UserSyncResult {
            last_sync: Utc::now().to_rfc3339(),
            node_count,
            earliest_expire: stats.earliest_expire,
            total_remain_gb: stats.total_remain_gb,
            protocols: stats.protocols,
        });
        self.store
            .set_json(&key, &user)
            .await
            .with_context(|| format!("Failed to persist user '{}'", username))?;

        info!("Sync for user '{}' complete: {} nodes", username, node_count);
        Ok(UserSyncOutcome {
            success: true,
            node_count: Some(node_count),
            error: None,
        })
    }

    // ========================================================================
    // Bulk Sync
    // ========================================================================

    /// Sync every user that carries a binding.
    ///
    /// One user's failure never aborts the rest. Without a configured
    /// upstream URL the pass is a no-op and nothing is recorded.
    pub async fn sync_all_users(&self) -> BulkSyncOutcome {
        info!("Starting bulk sync");
        match self.run_bulk_sync().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Bulk sync aborted: {:#}", e);
                BulkSyncOutcome::default()
            }
        }
    }

    async fn run_bulk_sync(&self) -> Result<BulkSyncOutcome> {
        let mut outcome = BulkSyncOutcome::default();

        if self.resolve_base_url().await?.is_none() {
            info!("Bulk sync skipped: no Sub-Store URL configured");
            return Ok(outcome);
        }

        let user_keys = self.store.list(keys::USER_PREFIX).await?;
        outcome.total = user_keys.len();

        for key in user_keys {
            let user: Option<User> = match self.store.get_json(&key).await {
                Ok(user) => user,
                Err(e) => {
                    warn!("Skipping unreadable user record '{}': {:#}", key, e);
                    continue;
                }
            };
            let Some(user) = user else {
                continue;
            };
            if user.binding.is_none() {
                debug!("Skipping user '{}': no binding", user.username);
                continue;
            }

            outcome.synced += 1;
            let result = self.sync_user(&user.username).await;
            if result.success {
                outcome.success += 1;
            } else {
                outcome.failed += 1;
            }
        }

        // The pass itself is recorded even when individual users failed
        let mut auto_sync = self.auto_sync_config().await.unwrap_or_default();
        auto_sync.last_scheduled_sync = Some(Utc::now().to_rfc3339());
        if let Err(e) = self.store.set_json(keys::CONFIG_AUTO_SYNC, &auto_sync).await {
            warn!("Failed to record bulk sync timestamp: {:#}", e);
        }

        info!(
            "Bulk sync complete: {}/{} attempts succeeded, {} users scanned",
            outcome.success, outcome.synced, outcome.total
        );
        Ok(outcome)
    }

    // ========================================================================
    // Upstream Listings
    // ========================================================================

    /// Share tokens known to the upstream backend
    pub async fn list_upstream_tokens(&self) -> Result<Vec<Token>> {
        let base_url = self.require_base_url().await?;
        let prefix = self.resolve_backend_prefix().await?;
        self.client.list_tokens(&base_url, &prefix).await
    }

    /// Collections known to the upstream backend
    pub async fn list_upstream_collections(&self) -> Result<Vec<Collection>> {
        let base_url = self.require_base_url().await?;
        let prefix = self.resolve_backend_prefix().await?;
        self.client.list_collections(&base_url, &prefix).await
    }

    // ========================================================================
    // Auto-Sync Configuration
    // ========================================================================

    /// The stored auto-sync record, defaults when absent
    pub async fn auto_sync_config(&self) -> Result<AutoSyncConfig> {
        let config: Option<AutoSyncConfig> = self.store.get_json(keys::CONFIG_AUTO_SYNC).await?;
        Ok(config.unwrap_or_default())
    }

    /// Enable scheduled bulk syncs at the given interval
    pub async fn enable_auto_sync(&self, interval_minutes: u64) -> Result<AutoSyncConfig> {
        if interval_minutes == 0 {
            bail!("Auto-sync interval must be at least 1 minute");
        }
        let mut config = self.auto_sync_config().await?;
        config.enabled = true;
        config.interval_minutes = interval_minutes;
        self.store.set_json(keys::CONFIG_AUTO_SYNC, &config).await?;
        info!("Auto-sync enabled every {} minutes", interval_minutes);
        Ok(config)
    }

    // ========================================================================
    // User Management
    // ========================================================================

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        self.store.get_json(&keys::user(username)).await
    }

    pub async fn create_user(&self, username: &str) -> Result<User> {
        validate_username(username)?;
        let key = keys::user(username);
        if self.store.get_raw(&key).await?.is_some() {
            bail!("User '{}' already exists", username);
        }
        let user = User::new(username);
        self.store.set_json(&key, &user).await?;
        info!("Created user '{}'", username);
        Ok(user)
    }

    /// All user records, sorted by username (store keys are sorted)
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for key in self.store.list(keys::USER_PREFIX).await? {
            match self.store.get_json(&key).await {
                Ok(Some(user)) => users.push(user),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable user record '{}': {:#}", key, e),
            }
        }
        Ok(users)
    }

    /// Bind a user to an upstream collection and share token
    pub async fn bind_user(&self, username: &str, collection: &str, token: &str) -> Result<User> {
        let key = keys::user(username);
        let user: Option<User> = self.store.get_json(&key).await?;
        let Some(mut user) = user else {
            bail!("Unknown user '{}'", username);
        };
        user.binding = Some(SubscriptionBinding {
            collection: collection.to_string(),
            token: token.to_string(),
        });
        self.store.set_json(&key, &user).await?;
        info!("Bound user '{}' to collection '{}'", username, collection);
        Ok(user)
    }

    /// Drop a user's binding; the last sync result is kept
    pub async fn unbind_user(&self, username: &str) -> Result<User> {
        let key = keys::user(username);
        let user: Option<User> = self.store.get_json(&key).await?;
        let Some(mut user) = user else {
            bail!("Unknown user '{}'", username);
        };
        user.binding = None;
        self.store.set_json(&key, &user).await?;
        info!("Removed binding for user '{}'", username);
        Ok(user)
    }

    async fn append_log(&self, entry: SyncLogEntry) {
        if let Err(e) = log::append(self.store.as_ref(), entry).await {
            warn!("Failed to append sync log entry: {:#}", e);
        }
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        bail!("Username must not be empty");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
    {
        bail!("Username may only contain letters, digits, '-', '_', '.' and '@'");
    }
    Ok(())
}
