//! Sync results, the rolling sync log and structured sync outcomes

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::parser::Protocol;

// ============================================================================
// Protocol Histogram
// ============================================================================

/// Per-protocol node counts for one sync
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtocolCounts {
    #[serde(default)]
    pub vless: usize,
    #[serde(default)]
    pub trojan: usize,
    #[serde(default)]
    pub shadowsocks: usize,
    #[serde(default)]
    pub vmess: usize,
    #[serde(default)]
    pub ssr: usize,
    #[serde(default)]
    pub other: usize,
}

impl ProtocolCounts {
    /// Bump the counter for one classified node
    pub fn record(&mut self, protocol: Protocol) {
        match protocol {
            Protocol::Vless => self.vless += 1,
            Protocol::Trojan => self.trojan += 1,
            Protocol::Shadowsocks => self.shadowsocks += 1,
            Protocol::Vmess => self.vmess += 1,
            Protocol::Ssr => self.ssr += 1,
            Protocol::Other => self.other += 1,
        }
    }

    /// Total nodes counted across all buckets
    pub fn total(&self) -> usize {
        self.vless + self.trojan + self.shadowsocks + self.vmess + self.ssr + self.other
    }
}

impl std::fmt::Display for ProtocolCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vless={} trojan={} shadowsocks={} vmess={} ssr={} other={}",
            self.vless, self.trojan, self.shadowsocks, self.vmess, self.ssr, self.other
        )
    }
}

// ============================================================================
// Stored Sync Results
// ============================================================================

/// Result of the last successful global sync, stored under `sync:result`.
///
/// Overwritten wholesale on success, never partially updated, untouched on
/// failure.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// RFC 3339 timestamp of the sync
    pub last_sync: String,

    /// Count of accepted proxy lines
    pub node_count: usize,

    /// Earliest expiry date across all nodes, `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_expire: Option<String>,

    /// Summed remaining traffic in GB; absent when no node carried traffic
    /// info, never zero-for-unknown
    #[serde(
        rename = "totalRemainGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_remain_gb: Option<f64>,

    /// The accepted share lines, verbatim
    #[serde(default)]
    pub raw_lines: Vec<String>,

    /// Per-protocol histogram
    #[serde(default)]
    pub protocols: ProtocolCounts,
}

/// Result of the last sync of one user, embedded in the user record.
///
/// Same shape as [`SyncResult`] minus the raw line retention.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSyncResult {
    pub last_sync: String,
    pub node_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_expire: Option<String>,
    #[serde(
        rename = "totalRemainGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_remain_gb: Option<f64>,
    #[serde(default)]
    pub protocols: ProtocolCounts,
}

// ============================================================================
// Sync Log
// ============================================================================

/// One entry in the rolling sync log stored under `sync:logs`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    /// RFC 3339 timestamp of the attempt
    pub timestamp: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncLogEntry {
    /// Entry for a completed sync
    pub fn success(node_count: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            success: true,
            node_count: Some(node_count),
            error: None,
        }
    }

    /// Entry for a failed sync attempt
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            success: false,
            node_count: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Sync Outcomes
// ============================================================================

/// Outcome of a global sync, returned to API collaborators and the CLI.
///
/// Sync entry points return this under every failure path instead of
/// propagating an error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSyncOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_expire: Option<String>,

    #[serde(
        rename = "totalRemainGB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_remain_gb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_lines: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GlobalSyncOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            node_count: None,
            earliest_expire: None,
            total_remain_gb: None,
            invalid_lines: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a single-user sync
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSyncOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserSyncOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            node_count: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a bulk sync over every bound user
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncOutcome {
    /// Users scanned from the store
    pub total: usize,

    /// Users that carried a binding and were attempted
    pub synced: usize,

    /// Attempts that succeeded
    pub success: usize,

    /// Attempts that failed; one failure never aborts the rest
    pub failed: usize,
}
