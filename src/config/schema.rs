//! Configuration schema for herdcache
//!
//! Configuration is stored at `~/.config/herdcache/config.toml`

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Request coalescing settings
    pub coalesce: CoalesceConfig,

    /// Backing store settings
    pub store: StoreConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Credential check settings
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Reject settings the read path cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got {:?}",
                self.general.log_format
            ));
        }
        if self.cache.ttl_ms == 0 {
            return Err("cache.ttl_ms must be greater than zero".to_string());
        }
        if self.cache.max_capacity == 0 {
            return Err("cache.max_capacity must be greater than zero".to_string());
        }
        if self.coalesce.wait_timeout_ms == Some(0) {
            return Err("coalesce.wait_timeout_ms must be greater than zero, or unset".to_string());
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(format!("server.bind is not a socket address: {}", self.server.bind));
        }
        if self.credentials.hash_rounds == 0 {
            return Err("credentials.hash_rounds must be at least 1".to_string());
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Which cache backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend: "memory" or "redis"
    pub backend: CacheBackend,

    /// Lifetime of every cached record in milliseconds
    pub ttl_ms: u64,

    /// Maximum entries held by the memory backend
    pub max_capacity: u64,

    /// Redis connection URL
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_ms: 30_000,
            max_capacity: 10_000,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Request coalescing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// How long a caller waits on a shared fetch before giving up (unset = no limit)
    pub wait_timeout_ms: Option<u64>,
}

impl CoalesceConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Artificial delay added to every lookup, in milliseconds
    pub latency_ms: u64,

    /// Number of customers generated at start-up
    pub seed: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            seed: 2,
        }
    }
}

impl StoreConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Credential check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// SHA-256 iterations per password derivation
    pub hash_rounds: u32,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            hash_rounds: 100_000,
        }
    }
}
