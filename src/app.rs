//! Wiring of collaborators into a ready-to-use read path
//!
//! The coalescer, cache, store and metrics are built once here and handed to
//! the reader explicitly; nothing is a process-wide singleton.

use crate::cache::{self, CacheStore};
use crate::coalesce::KeyedCoalescer;
use crate::config::Config;
use crate::credentials::CredentialVerifier;
use crate::error::HerdResult;
use crate::metrics::CacheMetrics;
use crate::reader::CacheAsideReader;
use crate::store::{Customer, MemoryStore, RecordStore};
use std::sync::Arc;
use tracing::info;

/// Everything the HTTP surface and CLI need
#[derive(Clone)]
pub struct App {
    pub reader: Arc<CacheAsideReader<Customer>>,
    pub store: Arc<MemoryStore<Customer>>,
    pub metrics: CacheMetrics,
    pub credentials: Arc<CredentialVerifier>,
}

impl App {
    /// Build the read path from config with the selected cache backend
    pub async fn build(config: &Config) -> HerdResult<Self> {
        let cache = cache::connect(&config.cache).await?;
        Self::with_cache(config, cache)
    }

    /// Build the read path around an existing cache
    pub fn with_cache(config: &Config, cache: Arc<dyn CacheStore>) -> HerdResult<Self> {
        let store = Arc::new(MemoryStore::<Customer>::new().with_latency(config.store.latency()));
        let metrics = CacheMetrics::new()?;

        info!(
            "Read path: cache={} ttl={:?} store={}",
            cache.backend_name(),
            config.cache.ttl(),
            store.backend_name()
        );

        let reader = CacheAsideReader::new(
            cache,
            store.clone(),
            KeyedCoalescer::new(),
            metrics.clone(),
            config.cache.ttl(),
        )
        .with_wait_timeout(config.coalesce.wait_timeout());

        let credentials = CredentialVerifier::new(
            KeyedCoalescer::new(),
            config.credentials.hash_rounds,
        );

        Ok(Self {
            reader: Arc::new(reader),
            store,
            metrics,
            credentials: Arc::new(credentials),
        })
    }
}
