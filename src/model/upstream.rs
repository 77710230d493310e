//! Upstream API wire types
//!
//! The aggregator's management API wraps every payload in a
//! `{ "status": ..., "data": ... }` envelope.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::user::User;

/// Response envelope used by the upstream `/api/*` routes
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the payload, failing when the upstream reported an error
    pub fn into_data(self) -> Result<T> {
        if self.status == "success" {
            Ok(self.data)
        } else {
            anyhow::bail!("Upstream API returned status '{}'", self.status)
        }
    }
}

/// One share token known to the upstream
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// The token value used in share URLs
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Expiry as a Unix timestamp, when the upstream sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// One collection known to the upstream
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,

    /// Subscription names grouped into this collection
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

/// Filters upstream tokens down to those no user is bound to.
///
/// Matching is on the token value only: a token bound under a different
/// collection still counts as bound, because syncs key off the token value.
pub fn unbound_tokens<'a>(tokens: &'a [Token], users: &[User]) -> Vec<&'a Token> {
    tokens
        .iter()
        .filter(|token| {
            !users.iter().any(|user| {
                user.binding
                    .as_ref()
                    .is_some_and(|binding| binding.token == token.token)
            })
        })
        .collect()
}
