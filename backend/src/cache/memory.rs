//! In-process expiring store
//!
//! Uses the tokio clock, so paused-time tests can move past expiry windows
//! without sleeping.

use super::{ExpiringStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Expiring store held in process memory
///
/// Only suitable for a single instance: counters are not shared between
/// processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.lock().await.retain(|_, entry| entry.is_live(now));
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let current = match entries.get(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => entry
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger {
                    key: key.to_string(),
                })?,
            None => 0,
        };
        let next = current + 1;

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
