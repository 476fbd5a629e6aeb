//! Cache collaborators for the read path
//!
//! The read path only needs three things from a cache: fetch bytes, store
//! bytes with a lifetime, and drop a key. Whatever sits behind the trait is
//! already safe for concurrent use, so callers never lock around it.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use crate::config::schema::{CacheBackend, CacheConfig};
use crate::error::HerdResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Abstract cache interface
///
/// A TTL is advisory to the backend: an entry may vanish earlier through
/// eviction, and absence after the TTL is never an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry, `None` when absent or expired
    async fn get(&self, key: &str) -> HerdResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> HerdResult<()>;

    /// Drop the entry for `key` if there is one
    async fn expire(&self, key: &str) -> HerdResult<()>;

    /// Get the human-readable backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// A cached value with its absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<[u8]>,
    pub ttl: Duration,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` from now
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Check if the entry is past its lifetime
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Create the cache backend selected in config
pub async fn connect(config: &CacheConfig) -> HerdResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new(config.max_capacity))),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => Ok(Arc::new(RedisCache::connect(&config.redis_url).await?)),
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => Err(crate::error::HerdError::User(
            "Redis cache requested but herdcache was built without the `redis` feature"
                .to_string(),
        )),
    }
}
