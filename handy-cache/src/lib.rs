//! # handy-cache
//!
//! Per-user scoped, compressed caching over Redis.
//!
//! ## Features
//!
//! - **User scoping**: keys written for an authenticated user are prefixed with
//!   `user_{name}_`; keys containing `_noUserData_` are shared
//! - **Compact payloads**: MessagePack + zstd, level 0-9, readable at any level
//! - **Graceful degradation**: a disabled cache or unreachable store never
//!   fails the caller, operations report a miss or a no-op instead
//! - **Bounded maintenance**: bulk deletes walk the keyspace with `SCAN` and
//!   delete page by page in capped batches
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handy_cache::{CacheClient, CacheConfig, Identity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::from_file("config/handy-cache.yml")?;
//!     let cache = CacheClient::connect(&config)?;
//!
//!     let alice = Identity::user("alice");
//!     let _ = cache.set_with_ttl(&alice, "dashboard", &vec![1, 2, 3], 600).await;
//!
//!     let widgets: Option<Vec<u32>> = cache.get(&alice, "dashboard").await.into_option();
//!     println!("Widgets: {:?}", widgets);
//!
//!     // Drop everything outside the session namespace
//!     let removed = cache.delete_without_prefixes(&["session:"]).await.unwrap_or(0);
//!     println!("Removed {} keys", removed);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod info;
pub mod outcome;
pub mod pattern;
pub mod scanner;
pub mod scope;
pub mod store;

pub use client::{CacheClient, DEFAULT_RETAINED};
pub use codec::{Codec, CompressLevel};
pub use config::{CacheConfig, LoggingConfig, StoreConfig};
pub use error::{CacheError, Result};
pub use info::StoreInfo;
pub use outcome::{Lookup, Outcome};
pub use scanner::KeyScanner;
pub use scope::{Identity, KeyScope, NO_USER_DATA};
pub use store::{CacheStore, MemoryStore, RedisStore, StoreTtl};
