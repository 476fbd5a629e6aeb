//! Prometheus counters for the read path
//!
//! Each `CacheMetrics` owns its own registry so that separate readers (and
//! separate tests) never collide on metric names.

use crate::error::{HerdError, HerdResult};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Counters exposed on `/metrics`
#[derive(Clone)]
pub struct CacheMetrics {
    registry: Registry,

    /// Successful cache populations after a store fetch
    pub hydrations: IntCounter,

    /// Reads answered from the cache
    pub hits: IntCounter,

    /// Reads that fell through to the store
    pub misses: IntCounter,
}

impl CacheMetrics {
    /// Create and register all counters
    pub fn new() -> HerdResult<Self> {
        let registry = Registry::new();

        let hydrations = register(
            &registry,
            "cache_hydration_counter",
            "The total number of cache hydrate events",
        )?;
        let hits = register(&registry, "cache_hits_total", "Reads served from the cache")?;
        let misses = register(
            &registry,
            "cache_misses_total",
            "Reads that fell through to the backing store",
        )?;

        Ok(Self {
            registry,
            hydrations,
            hits,
            misses,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> HerdResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| HerdError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| HerdError::Internal(format!("Metrics output is not UTF-8: {}", e)))
    }
}

fn register(registry: &Registry, name: &str, help: &str) -> HerdResult<IntCounter> {
    let counter = IntCounter::new(name, help)
        .map_err(|e| HerdError::Internal(format!("Failed to create {}: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| HerdError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}
