//! Cache client: scoping, encoding and graceful degradation over a [`CacheStore`]

use crate::codec::{Codec, CompressLevel};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::info::StoreInfo;
use crate::outcome::{Lookup, Outcome};
use crate::pattern;
use crate::scanner::KeyScanner;
use crate::scope::{Identity, KeyScope};
use crate::store::{CacheStore, RedisStore, StoreTtl};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Substring kept by a bulk prune when none is given (PHP session keys)
pub const DEFAULT_RETAINED: &str = "PHPREDIS_SESSION";

/// Caching adapter
///
/// Every operation checks the `enabled` gate first and never fails loudly:
/// problems come back as [`Lookup::Degraded`] / [`Outcome::Degraded`] and the
/// caller carries on as if nothing was cached.
///
/// # Example
/// ```no_run
/// use handy_cache::{CacheClient, CacheConfig, Identity};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = CacheClient::connect(&CacheConfig::default())?;
/// let bob = Identity::user("bob");
///
/// let _ = cache.set(&bob, "cart", &vec!["apple", "pear"]).await;
/// let cart: Option<Vec<String>> = cache.get(&bob, "cart").await.into_option();
/// # Ok(())
/// # }
/// ```
pub struct CacheClient<S: CacheStore = RedisStore> {
    store: S,
    enabled: bool,
    codec: Codec,
    default_ttl_secs: u64,
    scan_page_size: usize,
    delete_batch_size: usize,
}

impl CacheClient<RedisStore> {
    /// Validate the configuration and create a Redis-backed client.
    ///
    /// The connection is opened lazily by the first operation.
    pub fn connect(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = RedisStore::new(&config.store)?;
        info!(
            "Cache client for {} (enabled: {})",
            store.endpoint(),
            config.enabled
        );
        Ok(Self::with_store(store, config))
    }
}

impl<S: CacheStore> CacheClient<S> {
    /// Wrap an existing store
    pub fn with_store(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            codec: Codec::new(CompressLevel::new(config.compress_level)),
            default_ttl_secs: config.default_ttl_secs.max(1),
            scan_page_size: config.scan_page_size,
            delete_batch_size: config.delete_batch_size.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn compress_level(&self) -> u8 {
        self.codec.level().get()
    }

    /// Change the level used for later writes (clamped to 0-9).
    /// Existing entries stay readable.
    pub fn set_compress_level(&mut self, level: u8) {
        self.codec.set_level(CompressLevel::new(level));
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Key actually written to the store for `key` on behalf of `identity`
    pub fn effective_key(&self, identity: &Identity, key: &str) -> String {
        KeyScope::resolve(key, identity).into_owned()
    }

    /// Paginated scan over effective keys matching a glob pattern
    pub fn scanner(&self, pattern: &str) -> KeyScanner<'_, S> {
        KeyScanner::new(&self.store, pattern, self.scan_page_size)
    }

    fn gate(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(CacheError::FeatureDisabled)
        }
    }

    async fn ready(&self) -> Result<()> {
        self.gate()?;
        self.store.ensure_connected().await
    }

    /// Read and decode a value
    pub async fn get<T>(&self, identity: &Identity, key: &str) -> Lookup<T>
    where
        T: DeserializeOwned,
    {
        let key = KeyScope::resolve(key, identity);
        let result = self.read(&key).await;
        if let Ok(found) = &result {
            debug!("GET {} → {}", key, if found.is_some() { "hit" } else { "miss" });
        }
        note_degraded("GET", &key, result).into()
    }

    async fn read<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.ready().await?;
        match self.store.get(key).await? {
            Some(payload) if !payload.is_empty() => self.codec.decode(&payload).map(Some),
            _ => Ok(None),
        }
    }

    /// Remaining lifetime of an entry. Keys without expiry report a miss.
    pub async fn get_ttl(&self, identity: &Identity, key: &str) -> Lookup<Duration> {
        let key = KeyScope::resolve(key, identity);
        let result = async {
            self.ready().await?;
            Ok::<_, CacheError>(match self.store.ttl(&key).await? {
                StoreTtl::Expires(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => None,
            })
        }
        .await;
        note_degraded("TTL", &key, result).into()
    }

    /// Write a value with the configured default lifetime
    pub async fn set<T>(&self, identity: &Identity, key: &str, value: &T) -> Outcome<()>
    where
        T: Serialize + ?Sized,
    {
        self.set_with_ttl(identity, key, value, self.default_ttl_secs)
            .await
    }

    /// Write a value that expires after `ttl_secs`. A zero lifetime is rejected.
    pub async fn set_with_ttl<T>(
        &self,
        identity: &Identity,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Outcome<()>
    where
        T: Serialize + ?Sized,
    {
        let key = KeyScope::resolve(key, identity);
        let result = async {
            self.gate()?;
            if ttl_secs == 0 {
                return Err(CacheError::InvalidArgument(
                    "ttl must be at least one second".to_string(),
                ));
            }
            let payload = self.codec.encode(value)?;
            self.store.ensure_connected().await?;
            self.store.set_ex(&key, &payload, ttl_secs).await?;
            debug!("SET {} ({} bytes, ttl {}s)", key, payload.len(), ttl_secs);
            Ok(())
        }
        .await;
        note_degraded("SET", &key, result).into()
    }

    /// Whether a key is present. The key is used as given, without scoping.
    pub async fn exists(&self, key: &str) -> Outcome<bool> {
        let result = async {
            self.ready().await?;
            self.store.exists(key).await
        }
        .await;
        note_degraded("EXISTS", key, result).into()
    }

    /// Remove a single entry, or with `recursive` every entry under it as a prefix.
    /// Reports how many keys were removed.
    pub async fn delete_keys(
        &self,
        identity: &Identity,
        key: &str,
        recursive: bool,
    ) -> Outcome<usize> {
        let key = KeyScope::resolve(key, identity);
        let result = if recursive {
            let pattern = format!("{}*", pattern::escape(&key));
            self.delete_matching(&pattern, |_| true).await
        } else {
            async {
                self.ready().await?;
                self.store.del(&[key.to_string()]).await
            }
            .await
        };
        if let Ok(removed) = &result {
            debug!("DEL {} (recursive: {}) → {}", key, recursive, removed);
        }
        note_degraded("DEL", &key, result).into()
    }

    /// Remove every key that does not contain `keep`; [`DEFAULT_RETAINED`] keeps PHP sessions
    pub async fn delete_all_except(&self, keep: &str) -> Outcome<usize> {
        let result = if keep.is_empty() {
            self.gate().and(Err(CacheError::InvalidArgument(
                "retained substring must not be empty".to_string(),
            )))
        } else {
            self.delete_matching("*", |key| !key.contains(keep)).await
        };
        note_degraded("DEL-EXCEPT", keep, result).into()
    }

    /// Remove every key that starts with none of the `allowed` prefixes
    pub async fn delete_without_prefixes<P>(&self, allowed: &[P]) -> Outcome<usize>
    where
        P: AsRef<str>,
    {
        let result = if allowed.is_empty() {
            self.gate().and(Err(CacheError::InvalidArgument(
                "allowed prefix list must not be empty".to_string(),
            )))
        } else {
            self.delete_matching("*", |key| {
                !allowed.iter().any(|prefix| key.starts_with(prefix.as_ref()))
            })
            .await
        };
        note_degraded("DEL-PREFIXES", "*", result).into()
    }

    /// Scan `pattern` page by page and delete the keys selected by `doomed`,
    /// at most `delete_batch_size` keys per `DEL`.
    async fn delete_matching<F>(&self, pattern: &str, doomed: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.ready().await?;

        let mut scanner = self.scanner(pattern);
        let mut removed = 0;
        let mut pages = 0;
        while let Some(page) = scanner.next_page().await? {
            pages += 1;
            let targets: Vec<String> = page
                .into_iter()
                .filter(|key| doomed(key.as_str()))
                .collect();
            for batch in targets.chunks(self.delete_batch_size) {
                removed += self.store.del(batch).await?;
            }
        }

        info!(
            "Bulk delete over '{}': {} keys removed in {} pages",
            pattern, removed, pages
        );
        Ok(removed)
    }

    /// Drop every key of the selected database
    pub async fn flush(&self) -> Outcome<()> {
        let result = async {
            self.ready().await?;
            self.store.flush().await
        }
        .await;
        if result.is_ok() {
            info!("Flushed cache database");
        }
        note_degraded("FLUSHDB", "*", result).into()
    }

    /// Store status report
    pub async fn info(&self) -> Outcome<StoreInfo> {
        let result = async {
            self.ready().await?;
            self.store.info().await
        }
        .await;
        note_degraded("INFO", "-", result).into()
    }

    pub async fn ping(&self) -> Outcome<()> {
        let result = async {
            self.ready().await?;
            self.store.ping().await
        }
        .await;
        note_degraded("PING", "-", result).into()
    }
}

/// Log why an operation was bypassed
fn note_degraded<T>(op: &str, key: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        match err {
            CacheError::FeatureDisabled | CacheError::InvalidArgument(_) => {
                debug!("{} {} skipped: {}", op, key, err)
            }
            _ => warn!("{} {} failed: {}", op, key, err),
        }
    }
    result
}
