use super::{CacheStore, StoreTtl};
use crate::error::{CacheError, Result};
use crate::info::StoreInfo;
use crate::pattern;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use radix_trie::{Trie, TrieCommon};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Stored value with its expiry
#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Abandoned scans leave their cursor behind; the oldest are dropped past this
const MAX_OPEN_CURSORS: usize = 1024;

/// Expiry instant `ttl_secs` from now, `None` when it is beyond what `Instant` can hold
fn expiry_after(ttl_secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(ttl_secs))
}

impl StoredValue {
    fn new(data: Vec<u8>, expires_at: Option<Instant>) -> Self {
        Self { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Remaining lifetime rounded up to whole seconds
    fn remaining_ttl_secs(&self) -> Option<u64> {
        self.expires_at.map(|at| {
            let left = at.saturating_duration_since(Instant::now());
            left.as_millis().div_ceil(1000) as u64
        })
    }
}

/// Operation counters for [`MemoryStore`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    pub gets: u64,
    pub sets: u64,
    pub dels: u64,
    pub hits: u64,
    pub misses: u64,
    /// Number of `scan` round trips served
    pub scans: u64,
}

/// In-process store with Redis semantics (expiry, glob `MATCH`, cursor `SCAN`)
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Trie<String, StoredValue>>>,
    stats: Arc<RwLock<MemoryStats>>,
    /// Cursor token → last key examined by the page that issued it
    cursors: Arc<Mutex<BTreeMap<u64, String>>>,
    next_cursor: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw bytes, bypassing any codec. `None` (or a lifetime too far out
    /// to represent) keeps the key forever.
    pub fn set_raw(&self, key: &str, data: Vec<u8>, ttl_secs: Option<u64>) {
        let expires_at = ttl_secs.and_then(expiry_after);
        self.data
            .write()
            .insert(key.to_string(), StoredValue::new(data, expires_at));
    }

    /// Raw bytes stored under a key, ignoring expiry bookkeeping
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data
            .read()
            .get(key)
            .filter(|value| !value.is_expired())
            .map(|value| value.data.clone())
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read();
        let mut keys: Vec<String> = data
            .iter()
            .filter(|(_, v)| !v.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats.read().clone()
    }

    /// Simulate an unreachable store: every call fails with
    /// [`CacheError::ConnectionUnavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CacheError::ConnectionUnavailable(
                "memory store offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Sorted live keys sharing the literal prefix of `pattern`
    fn candidates(&self, pattern: &str) -> Vec<String> {
        let prefix = pattern::literal_prefix(pattern);
        let data = self.data.read();

        let mut keys: Vec<String> = if prefix.is_empty() {
            data.iter()
                .filter(|(_, v)| !v.is_expired())
                .map(|(k, _)| k.clone())
                .collect()
        } else {
            data.get_raw_descendant(prefix.as_str())
                .map(|subtrie| {
                    subtrie
                        .iter()
                        .filter(|(k, v)| k.starts_with(&prefix) && !v.is_expired())
                        .map(|(k, _)| k.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn ensure_connected(&self) -> Result<()> {
        self.check_online()
    }

    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        debug!("GET key={}", key);

        let mut data = self.data.write();
        let mut stats = self.stats.write();
        stats.gets += 1;

        match data.get(key).map(StoredValue::is_expired) {
            Some(true) => {
                debug!("Key expired: {}", key);
                data.remove(key);
                stats.misses += 1;
                Ok(None)
            }
            Some(false) => {
                stats.hits += 1;
                Ok(data.get(key).map(|value| value.data.clone()))
            }
            None => {
                stats.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        self.check_online()?;
        if ttl_secs == 0 {
            return Err(CacheError::Store(
                "invalid expire time in 'set' command".to_string(),
            ));
        }
        let expires_at = expiry_after(ttl_secs).ok_or_else(|| {
            CacheError::Store("invalid expire time in 'set' command".to_string())
        })?;
        debug!("SET key={}, size={}, ttl={}", key, value.len(), ttl_secs);

        self.data.write().insert(
            key.to_string(),
            StoredValue::new(value.to_vec(), Some(expires_at)),
        );
        self.stats.write().sets += 1;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<StoreTtl> {
        self.check_online()?;
        let data = self.data.read();
        Ok(match data.get(key) {
            None => StoreTtl::Missing,
            Some(value) if value.is_expired() => StoreTtl::Missing,
            Some(value) => match value.remaining_ttl_secs() {
                Some(secs) => StoreTtl::Expires(secs),
                None => StoreTtl::Persistent,
            },
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_online()?;
        let data = self.data.read();
        Ok(data.get(key).is_some_and(|value| !value.is_expired()))
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        self.check_online()?;
        debug!("DEL count={}", keys.len());

        let mut data = self.data.write();
        let mut removed = 0;
        for key in keys {
            if let Some(value) = data.remove(key.as_str()) {
                if !value.is_expired() {
                    removed += 1;
                }
            }
        }

        self.stats.write().dels += removed as u64;
        Ok(removed)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        self.check_online()?;
        debug!("SCAN cursor={}, pattern={}, count={}", cursor, pattern, count);

        let resume_after = if cursor == 0 {
            None
        } else {
            let token = self.cursors.lock().remove(&cursor);
            Some(token.ok_or_else(|| CacheError::Store("invalid cursor".to_string()))?)
        };

        let keys = self.candidates(pattern);
        let start = match &resume_after {
            Some(last) => keys.partition_point(|k| k <= last),
            None => 0,
        };

        let count = count.max(1);
        let window = &keys[start..keys.len().min(start + count)];
        let page: Vec<String> = window
            .iter()
            .filter(|key| pattern::glob_match(pattern, key))
            .cloned()
            .collect();

        let next = match window.last() {
            Some(last) if start + window.len() < keys.len() => {
                let token = self.next_cursor.fetch_add(1, Ordering::SeqCst) + 1;
                let mut cursors = self.cursors.lock();
                cursors.insert(token, last.clone());
                while cursors.len() > MAX_OPEN_CURSORS {
                    cursors.pop_first();
                }
                token
            }
            _ => 0,
        };

        self.stats.write().scans += 1;
        Ok((next, page))
    }

    async fn flush(&self) -> Result<()> {
        self.check_online()?;
        debug!("FLUSHDB");
        *self.data.write() = Trie::new();
        self.cursors.lock().clear();
        Ok(())
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.check_online()?;

        let (keys, expires) = {
            let data = self.data.read();
            data.iter()
                .filter(|(_, v)| !v.is_expired())
                .fold((0usize, 0usize), |(keys, expires), (_, v)| {
                    (keys + 1, expires + usize::from(v.expires_at.is_some()))
                })
        };
        let stats = self.stats();

        let mut text = String::new();
        text.push_str("# Server\r\nstore_mode:memory\r\n\r\n");
        text.push_str(&format!(
            "# Stats\r\nkeyspace_hits:{}\r\nkeyspace_misses:{}\r\ntotal_sets:{}\r\ntotal_deletes:{}\r\ntotal_scans:{}\r\n\r\n",
            stats.hits, stats.misses, stats.sets, stats.dels, stats.scans
        ));
        text.push_str("# Keyspace\r\n");
        if keys > 0 {
            text.push_str(&format!("db0:keys={keys},expires={expires}\r\n"));
        }

        Ok(StoreInfo::parse(&text))
    }
}
