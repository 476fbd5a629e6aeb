//! Configuration loading for herdcache
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! the TOML file, then `HERDCACHE_*` environment variables. The merged
//! result is validated before anything is built from it.

pub mod schema;

pub use schema::Config;

use crate::error::{HerdError, HerdResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Environment variables that override single config keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HERDCACHE_CACHE_BACKEND", "cache.backend"),
    ("HERDCACHE_CACHE_TTL_MS", "cache.ttl_ms"),
    ("HERDCACHE_REDIS_URL", "cache.redis_url"),
    ("HERDCACHE_WAIT_TIMEOUT_MS", "coalesce.wait_timeout_ms"),
    ("HERDCACHE_STORE_LATENCY_MS", "store.latency_ms"),
    ("HERDCACHE_BIND", "server.bind"),
    ("HERDCACHE_LOG_FORMAT", "general.log_format"),
];

/// Locates, reads and writes the config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use the platform config directory
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/herdcache/config.toml`, or `./herdcache/config.toml` when
    /// the platform has no config directory
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("herdcache")
            .join("config.toml")
    }

    /// Load file and environment layers over the defaults
    pub async fn load(&self) -> HerdResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!(
                "No config at {}, starting from defaults",
                self.config_path.display()
            );
            Config::default()
        };

        let overridden = apply_env_overrides(&mut config, |name| std::env::var(name).ok())
            .map_err(|reason| self.invalid(reason))?;
        if overridden > 0 {
            debug!("Applied {} environment override(s)", overridden);
        }

        config.validate().map_err(|reason| self.invalid(reason))?;
        Ok(config)
    }

    /// Parse one TOML file without environment overrides or validation
    pub async fn load_from_file(&self, path: &Path) -> HerdResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| HerdError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| HerdError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write `config` as pretty TOML, creating the parent directory
    pub async fn save(&self, config: &Config) -> HerdResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HerdError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: Arc::new(e),
                })?;
        }

        let rendered = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, rendered)
            .await
            .map_err(|e| HerdError::io(format!("writing {}", self.config_path.display()), e))?;

        info!("Wrote configuration to {}", self.config_path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn invalid(&self, reason: String) -> HerdError {
        HerdError::ConfigInvalid {
            path: self.config_path.clone(),
            reason,
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply every override `lookup` knows about, returning how many were set
///
/// Each value is parsed as a TOML scalar first (so `250` is a number), and
/// falls back to a plain string.
fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<usize, String> {
    let mut tree = toml::Value::try_from(&*config).map_err(|e| e.to_string())?;
    let mut applied = 0;

    for &(var, dotted) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else { continue };
        let (section, field) = dotted.split_once('.').unwrap_or(("", dotted));

        let value = toml::from_str::<toml::Table>(&format!("v = {}", raw))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .unwrap_or_else(|| toml::Value::String(raw.clone()));

        let table = tree
            .get_mut(section)
            .and_then(toml::Value::as_table_mut)
            .ok_or_else(|| format!("unknown config section `{}`", section))?;
        table.insert(field.to_string(), value);
        applied += 1;
    }

    if applied > 0 {
        *config = tree
            .try_into()
            .map_err(|e: toml::de::Error| format!("environment override rejected: {}", e))?;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CacheBackend;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("absent.toml"));

        let config = manager.load().await.unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn saved_file_is_loaded_back() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("nested").join("config.toml"));

        let mut config = Config::default();
        config.cache.ttl_ms = 1_000;
        config.coalesce.wait_timeout_ms = Some(200);
        manager.save(&config).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.cache.ttl(), Duration::from_secs(1));
        assert_eq!(loaded.coalesce.wait_timeout(), Some(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn malformed_file_names_its_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[cache]\nttl_ms = \"soon\"").await.unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        match err {
            HerdError::ConfigInvalid { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_ttl_fails_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, "[cache]\nttl_ms = 0").await.unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(err.to_string().contains("ttl_ms"));
    }

    #[test]
    fn env_overrides_numbers_and_strings() {
        let mut config = Config::default();
        let applied = apply_env_overrides(
            &mut config,
            env(&[
                ("HERDCACHE_CACHE_TTL_MS", "250"),
                ("HERDCACHE_CACHE_BACKEND", "redis"),
                ("HERDCACHE_BIND", "0.0.0.0:9000"),
                ("HERDCACHE_WAIT_TIMEOUT_MS", "75"),
            ]),
        )
        .unwrap();

        assert_eq!(applied, 4);
        assert_eq!(config.cache.ttl(), Duration::from_millis(250));
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.coalesce.wait_timeout(), Some(Duration::from_millis(75)));
    }

    #[test]
    fn env_override_with_wrong_type_is_rejected() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, env(&[("HERDCACHE_CACHE_TTL_MS", "soon")]))
            .unwrap_err();
        assert!(err.contains("environment override rejected"));
    }

    #[test]
    fn no_env_leaves_config_untouched() {
        let mut config = Config::default();
        assert_eq!(apply_env_overrides(&mut config, env(&[])).unwrap(), 0);
        assert_eq!(config.cache.ttl_ms, 30_000);
    }
}
