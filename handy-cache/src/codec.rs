//! Payload codec: MessagePack serialization followed by zstd compression

use crate::error::{CacheError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Compression effort in `[0, 9]`
///
/// The level only affects encode cost. It is never written into the payload,
/// so any reader decodes what any writer produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressLevel(u8);

impl CompressLevel {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 9;
    pub const DEFAULT: u8 = 5;

    /// Create a level, clamping anything above 9
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// zstd treats 0 as "library default", so 0 is pinned to its fastest level
    fn zstd_level(self) -> i32 {
        i32::from(self.0.max(1))
    }
}

impl Default for CompressLevel {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<u8> for CompressLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

/// Turns values into store payloads and back
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    level: CompressLevel,
}

impl Codec {
    pub fn new(level: CompressLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressLevel {
        self.level
    }

    pub fn set_level(&mut self, level: CompressLevel) {
        self.level = level;
    }

    /// Serialize then compress
    pub fn encode<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let raw = rmp_serde::to_vec_named(value)
            .map_err(|e| CacheError::InvalidArgument(format!("value not serializable: {e}")))?;

        let compressed = zstd::encode_all(raw.as_slice(), self.level.zstd_level())
            .map_err(|e| CacheError::InvalidArgument(format!("compression failed: {e}")))?;

        debug!(
            "Encoded payload: {} → {} bytes (level {})",
            raw.len(),
            compressed.len(),
            self.level.get()
        );

        Ok(compressed)
    }

    /// Decompress then deserialize
    pub fn decode<T>(&self, payload: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let raw = zstd::decode_all(payload)
            .map_err(|e| CacheError::CorruptPayload(format!("decompression failed: {e}")))?;

        rmp_serde::from_slice(&raw)
            .map_err(|e| CacheError::CorruptPayload(format!("deserialization failed: {e}")))
    }
}
