//! Port interface for the durable (cross-session) query cache tier.
//!
//! Tier access is synchronous: only network calls and timed waits suspend
//! the acquisition engine.
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{QueryCacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by a durable cache tier.
    pub enum DurableCacheError {
        /// Backing storage is unavailable, full, or denied access.
        Storage { message: String } => "durable cache storage failure: {message}",
        /// A stored entry could not be encoded or decoded.
        Serialization { message: String } => "durable cache serialisation failed: {message}",
    }
}

/// A cached query result with the instant it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    /// When the payload was written.
    pub stored_at: DateTime<Utc>,
    /// Parsed upstream response.
    pub value: Value,
}

/// Durable key-value tier holding serialised [`CachedPayload`] entries.
#[cfg_attr(test, mockall::automock)]
pub trait DurableCacheTier: Send + Sync {
    /// Read the entry stored for `key`, if any.
    fn load(&self, key: &QueryCacheKey) -> Result<Option<CachedPayload>, DurableCacheError>;

    /// Store `entry` under `key`, replacing any previous value.
    fn store(&self, key: &QueryCacheKey, entry: &CachedPayload) -> Result<(), DurableCacheError>;

    /// Remove the entry stored for `key`. Missing entries are not an error.
    fn evict(&self, key: &QueryCacheKey) -> Result<(), DurableCacheError>;
}
