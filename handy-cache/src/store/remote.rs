use super::{CacheStore, StoreTtl};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::info::StoreInfo;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, FromRedisValue, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Redis-backed store
///
/// The connection is opened lazily on first use. With `persistent` set it is
/// kept and shared by later calls; a connection-level failure drops it so the
/// next call reconnects. Without it every command opens its own connection.
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    persistent: bool,
    timeout: Duration,
    endpoint: String,
}

impl RedisStore {
    /// Create a store for the given configuration. Does not connect.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::open(config.connection_url())
            .map_err(|e| CacheError::Config(format!("invalid store address: {e}")))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            persistent: config.persistent,
            timeout: config.timeout(),
            endpoint: format!("{}:{}/{}", config.host, config.port, config.database),
        })
    }

    /// `host:port/db` this store points at
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .bounded(self.client.get_multiplexed_async_connection())
            .await?;
        info!("Connected to store at {}", self.endpoint);

        if self.persistent {
            *slot = Some(conn.clone());
        }
        Ok(conn)
    }

    async fn disconnect(&self) {
        if self.connection.lock().await.take().is_some() {
            warn!("Dropped connection to {}", self.endpoint);
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout),
        }
    }

    async fn query<T>(&self, cmd: Cmd) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.connection().await?;
        let result = self.bounded(cmd.query_async::<T>(&mut conn)).await;

        if let Err(err) = &result {
            if err.is_connection_error() {
                self.disconnect().await;
            }
        }
        result
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn ensure_connected(&self) -> Result<()> {
        // Non-persistent stores connect per command; nothing to warm up
        if !self.persistent {
            return Ok(());
        }
        self.connection().await.map(|_| ())
    }

    async fn ping(&self) -> Result<()> {
        let reply: String = self.query(redis::cmd("PING")).await?;
        debug!("PING → {}", reply);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl_secs);
        self.query(cmd).await
    }

    async fn ttl(&self, key: &str) -> Result<StoreTtl> {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        let reply: i64 = self.query(cmd).await?;
        Ok(StoreTtl::from_reply(reply))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        self.query(cmd).await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);
        self.query(cmd).await
    }

    async fn flush(&self) -> Result<()> {
        self.query(redis::cmd("FLUSHDB")).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        let text: String = self.query(redis::cmd("INFO")).await?;
        Ok(StoreInfo::parse(&text))
    }
}
