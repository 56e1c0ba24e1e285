//! Store seam: the key-value primitives the cache client relies on
//!
//! [`RedisStore`] talks to a real Redis server; [`MemoryStore`] keeps the
//! same semantics in-process for tests and local runs.

mod memory;
mod remote;

pub use self::memory::MemoryStore;
pub use self::remote::RedisStore;

use crate::error::Result;
use crate::info::StoreInfo;
use async_trait::async_trait;

/// Remaining lifetime as reported by the store's `TTL` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTtl {
    /// Key does not exist (or already expired)
    Missing,
    /// Key exists without an expiry
    Persistent,
    /// Seconds until expiry
    Expires(u64),
}

impl StoreTtl {
    /// Map the raw `TTL` reply (`-2` missing, `-1` persistent)
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -1 => Self::Persistent,
            n if n < 0 => Self::Missing,
            n => Self::Expires(n as u64),
        }
    }
}

/// Primitive operations against a key-value store
///
/// Keys given here are already effective keys; scoping and encoding live in
/// [`CacheClient`](crate::CacheClient).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Make sure a connection is available, connecting if needed.
    /// Cheap when already connected.
    async fn ensure_connected(&self) -> Result<()>;

    /// Round trip to the store
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a payload with an expiry in seconds (`SET key value EX ttl`)
    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()>;

    async fn ttl(&self, key: &str) -> Result<StoreTtl>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<usize>;

    /// One `SCAN cursor MATCH pattern COUNT count` step.
    /// Returns the next cursor (`0` once the iteration is complete) and a page of keys.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;

    /// Remove every key of the selected database
    async fn flush(&self) -> Result<()>;

    async fn info(&self) -> Result<StoreInfo>;
}
