use crate::error::{CacheError, Result};
use crate::scanner::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Entry lifetime used when a write does not give one (6 hours)
pub const DEFAULT_TTL_SECS: u64 = 21_600;

pub const ENV_ENABLED: &str = "HANDY_CACHE_ENABLED";
pub const ENV_HOST: &str = "HANDY_CACHE_HOST";
pub const ENV_PORT: &str = "HANDY_CACHE_PORT";

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Feature gate; when off every operation is a no-op
    pub enabled: bool,
    pub store: StoreConfig,
    pub default_ttl_secs: u64,
    /// zstd level 0-9 applied to new writes
    pub compress_level: u8,
    pub scan_page_size: usize,
    /// Upper bound on keys per `DEL` during bulk deletes
    pub delete_batch_size: usize,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub password: Option<String>,
    /// Keep the connection open between calls
    pub persistent: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: StoreConfig::default(),
            default_ttl_secs: DEFAULT_TTL_SECS,
            compress_level: 5,
            scan_page_size: DEFAULT_PAGE_SIZE,
            delete_batch_size: 500,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            persistent: true,
            timeout_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: CacheConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(CacheError::Config(msg.to_string()));

        if self.store.host.trim().is_empty() {
            return invalid("store.host must not be empty");
        }
        if self.store.port == 0 {
            return invalid("store.port must not be 0");
        }
        if self.store.timeout_ms == 0 {
            return invalid("store.timeout_ms must be positive");
        }
        if self.default_ttl_secs == 0 {
            return invalid("default_ttl_secs must be positive");
        }
        if self.compress_level > 9 {
            return invalid("compress_level must be between 0 and 9");
        }
        if self.scan_page_size == 0 {
            return invalid("scan_page_size must be positive");
        }
        if self.delete_batch_size == 0 {
            return invalid("delete_batch_size must be positive");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(CacheError::Config(format!(
                "unknown logging.format '{}' (expected text or json)",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Apply `HANDY_CACHE_*` environment variables on top of the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_ENABLED) {
            self.enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(CacheError::Config(format!(
                        "{ENV_ENABLED}: expected a boolean, got '{other}'"
                    )));
                }
            };
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.store.host = host;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            self.store.port = raw
                .trim()
                .parse()
                .map_err(|_| CacheError::Config(format!("{ENV_PORT}: invalid port '{raw}'")))?;
        }
        Ok(())
    }
}

impl StoreConfig {
    /// `redis://[:password@]host:port/db`
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{password}@{}:{}/{}",
                self.host, self.port, self.database
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
