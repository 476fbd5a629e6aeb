//! Redis cache backend
//!
//! Shares one multiplexed connection across all callers; Redis enforces the
//! TTL itself through `SET ... PX`.

use super::CacheStore;
use crate::error::{HerdError, HerdResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::info;

const BACKEND: &str = "redis";

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> HerdResult<Self> {
        let client = Client::open(url).map_err(|e| HerdError::backend(BACKEND, e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| HerdError::backend(BACKEND, e))?;

        info!("Connected to Redis cache at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> HerdResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| HerdError::backend(BACKEND, e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> HerdResult<()> {
        // Redis rejects PX 0, so round sub-millisecond lifetimes up.
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| HerdError::backend(BACKEND, e))
    }

    async fn expire(&self, key: &str) -> HerdResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| HerdError::backend(BACKEND, e))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
