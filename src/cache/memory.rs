//! In-process cache backed by Moka
//!
//! Each entry carries its own TTL. Moka purges entries on its own schedule,
//! so reads also check the stored expiry and treat anything past it as
//! absent.

use super::{CacheEntry, CacheStore};
use crate::error::HerdResult;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::trace;

/// Per-entry expiry policy: every write restarts the clock with its own TTL
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-based in-memory cache
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    max_capacity: u64,
}

impl MemoryCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();

        Self {
            cache,
            max_capacity,
        }
    }

    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    /// Insert a pre-built entry, bypassing `set`
    pub async fn insert_entry(&self, key: &str, entry: CacheEntry) {
        self.cache.insert(key.to_string(), entry).await;
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> HerdResult<Option<Vec<u8>>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                trace!("Entry for {} is past its TTL", key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.to_vec())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> HerdResult<()> {
        self.cache
            .insert(key.to_string(), CacheEntry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn expire(&self, key: &str) -> HerdResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_capacity", &self.max_capacity)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
