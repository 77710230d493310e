//! Auto-sync scheduler
//!
//! A polling watcher around the stored auto-sync record. Each tick re-reads
//! the record, so enabling, disabling or retiming auto-sync takes effect
//! without restarting the watcher. The due-check is pure and anchored to the
//! `last_scheduled_sync` timestamp the bulk sync writes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::model::AutoSyncConfig;
use crate::sync::SyncEngine;

/// How often the watcher re-reads the stored record
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Whether a scheduled bulk sync is due at `now`.
///
/// A missing or unreadable `last_scheduled_sync` counts as due: the next
/// pass rewrites it and self-heals the record.
pub fn is_due(config: &AutoSyncConfig, now: DateTime<Utc>) -> bool {
    if !config.enabled {
        return false;
    }
    let Some(last) = config.last_scheduled_sync.as_deref() else {
        return true;
    };
    match DateTime::parse_from_rfc3339(last) {
        Ok(last) => {
            now.signed_duration_since(last)
                >= chrono::Duration::minutes(config.interval_minutes as i64)
        }
        Err(_) => true,
    }
}

/// Run the watcher until the process exits.
///
/// Transient store failures are logged and retried on the next tick rather
/// than stopping the watcher.
pub async fn run(engine: &SyncEngine) {
    let mut ticker = time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Auto-sync watcher started, polling every {}s",
        POLL_INTERVAL.as_secs()
    );
    loop {
        ticker.tick().await;

        let config = match engine.auto_sync_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to read auto-sync configuration: {:#}", e);
                continue;
            }
        };
        if !is_due(&config, Utc::now()) {
            continue;
        }

        debug!("Auto-sync due, starting scheduled pass");
        let global = engine.sync_global().await;
        if !global.success {
            warn!(
                "Scheduled global sync failed: {}",
                global.error.as_deref().unwrap_or("unknown error")
            );
        }
        let bulk = engine.sync_all_users().await;
        info!(
            "Scheduled sync finished: global {}, users {}/{}",
            if global.success { "ok" } else { "failed" },
            bulk.success,
            bulk.synced
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn config(enabled: bool, interval_minutes: u64, last: Option<&str>) -> AutoSyncConfig {
        AutoSyncConfig {
            enabled,
            interval_minutes,
            last_scheduled_sync: last.map(str::to_string),
        }
    }

    #[test]
    fn test_disabled_is_never_due() {
        let now = at("2026-08-25T12:00:00Z");
        assert!(!is_due(&config(false, 60, None), now));
        assert!(!is_due(
            &config(false, 60, Some("2020-01-01T00:00:00Z")),
            now
        ));
    }

    #[test]
    fn test_enabled_without_history_is_due() {
        let now = at("2026-08-25T12:00:00Z");
        assert!(is_due(&config(true, 60, None), now));
    }

    #[test]
    fn test_due_after_interval_elapses() {
        let now = at("2026-08-25T12:00:00Z");
        let cfg = config(true, 60, Some("2026-08-25T11:30:00Z"));
        assert!(!is_due(&cfg, now));

        let cfg = config(true, 60, Some("2026-08-25T10:59:00Z"));
        assert!(is_due(&cfg, now));

        // Boundary: exactly one interval ago counts as due
        let cfg = config(true, 60, Some("2026-08-25T11:00:00Z"));
        assert!(is_due(&cfg, now));
    }

    #[test]
    fn test_malformed_timestamp_is_due() {
        let now = at("2026-08-25T12:00:00Z");
        let cfg = config(true, 60, Some("not a timestamp"));
        assert!(is_due(&cfg, now));
    }

    #[test]
    fn test_interval_change_applies() {
        let now = at("2026-08-25T12:00:00Z");
        let last = Some("2026-08-25T11:45:00Z");
        assert!(!is_due(&config(true, 60, last), now));
        assert!(is_due(&config(true, 10, last), now));
    }
}
