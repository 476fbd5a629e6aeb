//! Cache-aside read path
//!
//! `get` probes the cache first. On a miss it coalesces the store lookup so
//! that concurrent misses for one key cost a single lookup and a single cache
//! write, then hands the record to every waiter.
//!
//! Cache trouble never fails a read: an undecodable or unreachable entry is a
//! miss, and a failed write after a successful lookup is only logged. Store
//! errors reach every waiter unchanged and are never cached.

use crate::cache::CacheStore;
use crate::coalesce::KeyedCoalescer;
use crate::error::HerdResult;
use crate::metrics::CacheMetrics;
use crate::store::RecordStore;
use prometheus::IntCounter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reads records through a cache, coalescing misses per key
pub struct CacheAsideReader<R> {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RecordStore<R>>,
    coalescer: KeyedCoalescer<R>,
    metrics: CacheMetrics,
    ttl: Duration,
    wait_timeout: Option<Duration>,
}

impl<R> CacheAsideReader<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a reader; `ttl` is the lifetime of every entry it writes
    pub fn new(
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn RecordStore<R>>,
        coalescer: KeyedCoalescer<R>,
        metrics: CacheMetrics,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            store,
            coalescer,
            metrics,
            ttl,
            wait_timeout: None,
        }
    }

    /// Bound how long `get` waits on a coalesced fetch
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Read `key` through the cache, coalescing concurrent misses
    pub async fn get(&self, key: &str) -> HerdResult<R> {
        match self.wait_timeout {
            Some(timeout) => self.get_with_timeout(key, timeout).await,
            None => {
                if let Some(record) = self.probe(key).await {
                    return Ok(record);
                }
                let hydrate = self.hydrate();
                let owned = key.to_string();
                self.coalescer.run(key, move || hydrate.run(owned)).await
            }
        }
    }

    /// Like [`get`](Self::get), but stop waiting on the fetch after `timeout`
    ///
    /// Giving up only detaches this caller; the fetch still completes and
    /// populates the cache for everyone else.
    pub async fn get_with_timeout(&self, key: &str, timeout: Duration) -> HerdResult<R> {
        if let Some(record) = self.probe(key).await {
            return Ok(record);
        }
        let hydrate = self.hydrate();
        let owned = key.to_string();
        self.coalescer
            .run_with_timeout(key, move || hydrate.run(owned), timeout)
            .await
    }

    /// Plain cache-aside read: every concurrent miss hits the store
    pub async fn get_uncoalesced(&self, key: &str) -> HerdResult<R> {
        if let Some(record) = self.probe(key).await {
            return Ok(record);
        }
        self.hydrate().run(key.to_string()).await
    }

    /// Drop the cached entry for `key`
    pub async fn invalidate(&self, key: &str) -> HerdResult<()> {
        self.cache.expire(key).await
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn coalescer(&self) -> &KeyedCoalescer<R> {
        &self.coalescer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn probe(&self, key: &str) -> Option<R> {
        let found = match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Ignoring undecodable cache entry for {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Cache probe on {} failed for {}: {}",
                    self.cache.backend_name(),
                    key,
                    e
                );
                None
            }
        };

        if found.is_some() {
            debug!("Cache hit for {}", key);
            self.metrics.hits.inc();
        } else {
            self.metrics.misses.inc();
        }
        found
    }

    fn hydrate(&self) -> Hydrate<R> {
        Hydrate {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            hydrations: self.metrics.hydrations.clone(),
            ttl: self.ttl,
        }
    }
}

/// Owned fetch-and-populate step, so it can outlive the caller that started it
struct Hydrate<R> {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RecordStore<R>>,
    hydrations: IntCounter,
    ttl: Duration,
}

impl<R> Hydrate<R>
where
    R: Serialize + Send + Sync + 'static,
{
    async fn run(self, key: String) -> HerdResult<R> {
        let record = self.store.lookup(&key).await?;

        match serde_json::to_vec(&record) {
            Ok(bytes) => match self.cache.set(&key, bytes, self.ttl).await {
                Ok(()) => {
                    self.hydrations.inc();
                    debug!("Cached {} for {:?}", key, self.ttl);
                }
                Err(e) => warn!("Failed to cache {}: {}", key, e),
            },
            Err(e) => warn!("Failed to encode {} for caching: {}", key, e),
        }

        Ok(record)
    }
}
