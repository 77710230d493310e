//! Persisted records, upstream wire types and sync outcome types
//!
//! Everything in here serializes with camelCase field names: the records are
//! read by API and page collaborators that expect the JSON shapes the store
//! has always held.

// Sub-modules
pub mod admin;
pub mod result;
pub mod upstream;
pub mod user;

// Re-exports
pub use admin::{AutoSyncConfig, SubStoreConfig};
pub use result::{
    BulkSyncOutcome, GlobalSyncOutcome, ProtocolCounts, SyncLogEntry, SyncResult, UserSyncOutcome,
    UserSyncResult,
};
pub use upstream::{ApiEnvelope, Collection, Token, unbound_tokens};
pub use user::{SubscriptionBinding, User};
