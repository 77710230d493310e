//! Stored admin configuration records

use serde::{Deserialize, Serialize};

/// Stored upstream configuration, key `config:substore`.
///
/// Takes priority over the process environment when resolving the upstream
/// base URL and backend prefix.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubStoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path prefix in front of the upstream `/api` routes, e.g. `/sub`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_prefix: Option<String>,
}

/// Stored auto-sync configuration, key `config:auto_sync`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoSyncConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// RFC 3339 timestamp of the last bulk sync pass, written regardless of
    /// per-user outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scheduled_sync: Option<String>,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            last_scheduled_sync: None,
        }
    }
}

fn default_interval_minutes() -> u64 {
    60
}
