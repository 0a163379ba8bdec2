//! Two-tier, time-boxed cache for Overpass query results.
//!
//! Reads check the in-process tier first, then the durable tier; durable
//! hits are promoted into memory. Entries older than the TTL are treated as
//! absent and evicted lazily on read. Writes go to both tiers; a durable
//! failure is reported to the caller but never undoes the memory write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::Value;
use tracing::debug;

use super::ports::{CachedPayload, DurableCacheTier, QueryCacheKey, define_port_error};

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

define_port_error! {
    /// Errors reported by [`CacheStore::put`].
    pub enum CacheStoreError {
        /// The durable tier rejected the write; the entry lives in memory only.
        StorageUnavailable { message: String } =>
            "durable cache unavailable, caching in memory only: {message}",
    }
}

/// Process-wide query result cache.
pub struct CacheStore {
    memory: Mutex<HashMap<QueryCacheKey, CachedPayload>>,
    durable: Option<Arc<dyn DurableCacheTier>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CacheStore {
    /// Memory-only cache with the default TTL.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            durable: None,
            clock,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Two-tier cache backed by `durable`, with the default TTL.
    pub fn with_durable(clock: Arc<dyn Clock>, durable: Arc<dyn DurableCacheTier>) -> Self {
        Self {
            durable: Some(durable),
            ..Self::in_memory(clock)
        }
    }

    /// Override the entry lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Look up the cached result for `query`.
    pub fn get(&self, query: &str) -> Option<Value> {
        let key = QueryCacheKey::from_query(query);
        let now = self.clock.utc();

        {
            let mut memory = self.lock_memory();
            match memory.get(&key) {
                Some(entry) if self.is_fresh(entry, now) => {
                    debug!(tier = "memory", "query cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {
                    memory.remove(&key);
                }
                None => {}
            }
        }

        let durable = self.durable.as_ref()?;
        let entry = match durable.load(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(error) => {
                debug!(error = %error, kind = error.kind(), "durable cache read failed");
                return None;
            }
        };
        if !self.is_fresh(&entry, now) {
            if let Err(error) = durable.evict(&key) {
                debug!(error = %error, "durable cache eviction failed");
            }
            return None;
        }

        debug!(tier = "durable", "query cache hit; promoting to memory");
        let value = entry.value.clone();
        self.lock_memory().insert(key, entry);
        Some(value)
    }

    /// Store `value` as the result for `query` in both tiers.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError::StorageUnavailable`] when the durable write
    /// fails. The in-memory write has already succeeded at that point.
    pub fn put(&self, query: &str, value: Value) -> Result<(), CacheStoreError> {
        let key = QueryCacheKey::from_query(query);
        let entry = CachedPayload {
            stored_at: self.clock.utc(),
            value,
        };

        let durable_result = self
            .durable
            .as_ref()
            .map_or(Ok(()), |durable| durable.store(&key, &entry));
        self.lock_memory().insert(key, entry);

        durable_result.map_err(|error| CacheStoreError::storage_unavailable(error.to_string()))
    }

    fn is_fresh(&self, entry: &CachedPayload, now: DateTime<Utc>) -> bool {
        // An unrepresentable TTL never expires.
        let Ok(ttl) = TimeDelta::from_std(self.ttl) else {
            return true;
        };
        now.signed_duration_since(entry.stored_at) <= ttl
    }

    fn lock_memory(&self) -> MutexGuard<'_, HashMap<QueryCacheKey, CachedPayload>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
