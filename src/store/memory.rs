//! In-process record store
//!
//! Stands in for the remote table. An optional artificial latency makes the
//! cost of a lookup visible when comparing coalesced and plain reads.

use super::{Customer, RecordStore};
use crate::error::{HerdError, HerdResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Map-backed store, safe for concurrent use
pub struct MemoryStore<R> {
    records: RwLock<HashMap<String, R>>,
    latency: Duration,
    lookups: AtomicU64,
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            latency: Duration::ZERO,
            lookups: AtomicU64::new(0),
        }
    }
}

impl<R> MemoryStore<R>
where
    R: Clone + Send + Sync,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every lookup by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Insert or replace a record
    pub async fn insert(&self, key: impl Into<String>, record: R) {
        self.records.write().await.insert(key.into(), record);
    }

    /// Remove a record, returning it if present
    pub async fn remove(&self, key: &str) -> Option<R> {
        self.records.write().await.remove(key)
    }

    /// Total lookups served, found or not
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl MemoryStore<Customer> {
    /// Seed `count` customers with fresh ids, alternating active and inactive
    pub async fn seed_customers(&self, count: usize) -> Vec<Customer> {
        let mut seeded = Vec::with_capacity(count);

        for i in 0..count {
            let status = if i % 2 == 0 { "active" } else { "not active" };
            let customer = Customer::new(Uuid::new_v4().to_string(), status);
            self.insert(customer.id.clone(), customer.clone()).await;
            info!("Inserted customer: {}", customer.id);
            seeded.push(customer);
        }

        seeded
    }
}

#[async_trait]
impl<R> RecordStore<R> for MemoryStore<R>
where
    R: Clone + Send + Sync,
{
    async fn lookup(&self, key: &str) -> HerdResult<R> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        debug!("Store lookup for {}", key);
        self.records
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| HerdError::not_found(key))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
