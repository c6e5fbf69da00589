//! Redis-backed expiring store

use super::{ExpiringStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis store over a multiplexed, auto-reconnecting connection
///
/// `ConnectionManager` is cheap to clone; each operation works on its own
/// clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the Redis server at `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

/// Redis expiries have second granularity; never round a TTL down to zero
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ExpiringStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        // MULTI/EXEC keeps increment and expiry refresh in one atomic step
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
