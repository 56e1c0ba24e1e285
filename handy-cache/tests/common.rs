//! Common test utilities

use handy_cache::{CacheClient, CacheConfig, MemoryStore, RedisStore, StoreConfig};

/// Route library logs to the test harness (`RUST_LOG=debug` to see them)
#[allow(dead_code)] // Used by other test modules
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client over an in-process store with default settings
#[allow(dead_code)] // Used by other test modules
pub fn setup_memory_client() -> CacheClient<MemoryStore> {
    setup_memory_client_with(CacheConfig::default())
}

#[allow(dead_code)] // Used by other test modules
pub fn setup_memory_client_with(config: CacheConfig) -> CacheClient<MemoryStore> {
    CacheClient::with_store(MemoryStore::new(), &config)
}

/// Client with the feature gate switched off
#[allow(dead_code)] // Used by other test modules
pub fn setup_disabled_client() -> CacheClient<MemoryStore> {
    let mut config = CacheConfig::default();
    config.enabled = false;
    setup_memory_client_with(config)
}

/// Setup a client for S2S tests (requires running Redis)
#[allow(dead_code)] // Used by S2S test modules
pub fn setup_s2s_client() -> CacheClient<RedisStore> {
    init_tracing();
    let mut config = CacheConfig::default();
    config.store = StoreConfig {
        host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: std::env::var("REDIS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(6379),
        database: std::env::var("REDIS_DB")
            .ok()
            .and_then(|db| db.parse().ok())
            .unwrap_or(15),
        timeout_ms: 5000,
        ..StoreConfig::default()
    };
    CacheClient::connect(&config).expect("Failed to create S2S client")
}

/// Unique namespace so concurrent test runs do not collide
#[allow(dead_code)] // Used by S2S test modules
pub fn unique_namespace(test: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("hc_test:{test}:{nanos}:")
}
