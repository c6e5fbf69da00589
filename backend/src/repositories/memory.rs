//! In-memory account repository
//!
//! Backs tests and local runs without PostgreSQL. Enforces the same
//! uniqueness rules as the `accounts` table.

use super::account::{Account, AccountRepository, NewAccount, RepositoryError, UniqueField};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    accounts: BTreeMap<i64, Account>,
}

/// Account repository held in process memory
#[derive(Clone, Default)]
pub struct InMemoryAccountRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.values().find(|a| a.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut inner = self.inner.write().await;

        if inner.accounts.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::UniqueViolation(UniqueField::Email));
        }
        if inner.accounts.values().any(|a| a.username == account.username) {
            return Err(RepositoryError::UniqueViolation(UniqueField::Username));
        }

        // ids start at 1, matching BIGSERIAL
        inner.next_id += 1;
        let created = Account {
            id: inner.next_id,
            email: account.email,
            username: account.username,
            password_hash: account.password_hash,
            created_at: Utc::now(),
        };
        inner.accounts.insert(created.id, created.clone());

        Ok(created)
    }
}
