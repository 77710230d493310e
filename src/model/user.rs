//! User records and subscription bindings

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::result::UserSyncResult;

/// Which upstream share a user is bound to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionBinding {
    /// Upstream collection name, stored raw (percent-encoding happens at
    /// URL-build time)
    pub collection: String,

    /// Share token value
    pub token: String,
}

/// One user, stored under `user:<username>`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,

    /// RFC 3339 creation timestamp
    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<SubscriptionBinding>,

    /// Written only when this user is synced, individually or via bulk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_result: Option<UserSyncResult>,
}

impl User {
    /// Create a fresh user without binding or sync history
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            created_at: Utc::now().to_rfc3339(),
            binding: None,
            last_sync_result: None,
        }
    }
}
