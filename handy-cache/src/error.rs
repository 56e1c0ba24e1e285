//! Error types for the cache layer

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Reasons a cache operation did not take effect.
///
/// Public [`CacheClient`](crate::CacheClient) operations never return these
/// as `Err`; they are carried inside [`Lookup`](crate::Lookup) and
/// [`Outcome`](crate::Outcome) so callers can see why the cache was bypassed.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache subsystem is switched off
    #[error("cache disabled, check the `enabled` setting")]
    FeatureDisabled,

    /// Store unreachable (connect refused, connection dropped, I/O error)
    #[error("store connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// Stored bytes failed to decompress or deserialize
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Rejected locally before reaching the store
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store replied with an error
    #[error("store error: {0}")]
    Store(String),

    /// Store round trip exceeded the configured timeout
    #[error("store operation timed out")]
    Timeout,

    /// Invalid configuration (startup only)
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// True when the error means the store could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable(_) | Self::Timeout)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
        {
            Self::ConnectionUnavailable(err.to_string())
        } else {
            Self::Store(err.to_string())
        }
    }
}

impl From<serde_yaml::Error> for CacheError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
