use config as cfg;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{PrintForgeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on an uploaded model body, in bytes.
    #[serde(default = "ServerConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    fn default_max_upload_bytes() -> usize {
        32 * 1024 * 1024
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/printforge.db".into(),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. The default exists for local development only
    /// and is overridden via PRINTFORGE__AUTH__JWT_SECRET in deployments.
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Accounts registered with one of these emails are granted the admin
    /// role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl AuthConfig {
    fn default_token_ttl_secs() -> u64 {
        60 * 60 * 8
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "printforge-dev-secret".into(),
            token_ttl_secs: Self::default_token_ttl_secs(),
            admin_emails: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "QueueConfig::default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "QueueConfig::default_channel_capacity")]
    pub channel_capacity: usize,
    /// Idle poll interval for the dispatch loop, milliseconds.
    #[serde(default = "QueueConfig::default_dispatch_idle_ms")]
    pub dispatch_idle_ms: u64,
    /// Print duration used by the simulated driver.
    #[serde(default = "QueueConfig::default_simulated_print_secs")]
    pub simulated_print_secs: u64,
}

impl QueueConfig {
    fn default_worker_count() -> usize {
        2
    }
    fn default_channel_capacity() -> usize {
        64
    }
    fn default_dispatch_idle_ms() -> u64 {
        100
    }
    fn default_simulated_print_secs() -> u64 {
        2
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: Self::default_worker_count(),
            channel_capacity: Self::default_channel_capacity(),
            dispatch_idle_ms: Self::default_dispatch_idle_ms(),
            simulated_print_secs: Self::default_simulated_print_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,
    #[serde(default = "CacheConfig::default_ttl_secs")]
    pub ttl_secs: u64,
    /// Access count at which an entry is considered hot and granted one TTL
    /// extension.
    #[serde(default = "CacheConfig::default_popularity_threshold")]
    pub popularity_threshold: u64,
    #[serde(default = "CacheConfig::default_ttl_extension_factor")]
    pub ttl_extension_factor: f64,
}

impl CacheConfig {
    fn default_capacity() -> usize {
        1024
    }
    fn default_ttl_secs() -> u64 {
        60 * 60
    }
    fn default_popularity_threshold() -> u64 {
        5
    }
    fn default_ttl_extension_factor() -> f64 {
        2.0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            ttl_secs: Self::default_ttl_secs(),
            popularity_threshold: Self::default_popularity_threshold(),
            ttl_extension_factor: Self::default_ttl_extension_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "MonitoringConfig::default_latency_ms")]
    pub request_latency_ms: f64,
    #[serde(default = "MonitoringConfig::default_queue_depth")]
    pub queue_depth: f64,
    #[serde(default = "MonitoringConfig::default_cache_miss_rate")]
    pub cache_miss_rate: f64,
    #[serde(default = "MonitoringConfig::default_cooldown_secs")]
    pub alert_cooldown_secs: u64,
    #[serde(default = "MonitoringConfig::default_retention_secs")]
    pub alert_retention_secs: u64,
    #[serde(default = "MonitoringConfig::default_history_capacity")]
    pub history_capacity: usize,
}

impl MonitoringConfig {
    fn default_latency_ms() -> f64 {
        500.0
    }
    fn default_queue_depth() -> f64 {
        100.0
    }
    fn default_cache_miss_rate() -> f64 {
        0.9
    }
    fn default_cooldown_secs() -> u64 {
        300
    }
    fn default_retention_secs() -> u64 {
        7 * 24 * 60 * 60
    }
    fn default_history_capacity() -> usize {
        1000
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_latency_ms: Self::default_latency_ms(),
            queue_depth: Self::default_queue_depth(),
            cache_miss_rate: Self::default_cache_miss_rate(),
            alert_cooldown_secs: Self::default_cooldown_secs(),
            alert_retention_secs: Self::default_retention_secs(),
            history_capacity: Self::default_history_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrintForgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl PrintForgeConfig {
    /// Layered load: `printforge.toml` (optional) overridden by
    /// `PRINTFORGE__*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("printforge")
    }

    pub fn load_from(basename: &str) -> Result<Self> {
        let settings = cfg::Config::builder()
            .add_source(cfg::File::with_name(basename).required(false))
            .add_source(cfg::Environment::with_prefix("PRINTFORGE").separator("__"))
            .build()
            .map_err(|e| PrintForgeError::Config(e.to_string()))?;

        let loaded: PrintForgeConfig = settings
            .try_deserialize()
            .map_err(|e| PrintForgeError::Config(e.to_string()))?;

        info!(
            host = %loaded.server.host,
            port = loaded.server.port,
            db = %loaded.storage.path,
            "configuration loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PrintForgeConfig::default();
        assert_eq!(config.server.port, 3000);
        assert!(config.cache.capacity > 0);
        assert!(config.queue.worker_count > 0);
        assert!(config.monitoring.alert_retention_secs > config.monitoring.alert_cooldown_secs);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = PrintForgeConfig::load_from("does-not-exist").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
