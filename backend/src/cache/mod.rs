//! Expiring key-value storage
//!
//! The login guard keeps its counters in a store whose entries expire on
//! their own. Production uses Redis; [`MemoryStore`] serves single-instance
//! runs without Redis and tests.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("value at {key} is not an integer")]
    NotAnInteger { key: String },
}

/// Key-value store with per-entry expiry
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Read a value; expired and missing entries are both `None`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    /// Atomically increment an integer entry (absent counts as 0) and reset
    /// its expiry to `ttl`. Returns the post-increment value.
    ///
    /// A live entry that does not hold an integer is an error and is left
    /// untouched, as with Redis `INCR`.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Remove an entry; removing a missing entry is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
