//! Application state management
//!
//! This module provides the shared application state that is passed
//! to all request handlers via Axum's state extraction.
//!
//! # Design Principles
//!
//! 1. **Pre-compute expensive resources**: token keys, DB pools are created once
//! 2. **Cheap cloning**: All fields use Arc or are already Clone-cheap
//! 3. **Immutable after creation**: State is read-only during request handling

use crate::auth::{LoginGuard, TokenConfigError, TokenService};
use crate::cache::ExpiringStore;
use crate::config::AppConfig;
use crate::repositories::AccountRepository;
use crate::services::AccountService;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state
///
/// The account repository and expiring store are injected, so the same
/// state runs against PostgreSQL/Redis in production and in-memory
/// collaborators in tests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Pre-initialized token service with cached keys
    pub tokens: TokenService,
    pub accounts: AccountService,
    /// Pool checked by the readiness endpoint, absent when running without a database
    pub db: Option<PgPool>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state
    ///
    /// Fails when no token signing key is configured.
    pub fn new(
        config: AppConfig,
        repository: Arc<dyn AccountRepository>,
        store: Arc<dyn ExpiringStore>,
    ) -> Result<Self, TokenConfigError> {
        let tokens = TokenService::new(&config.jwt.secret, config.token_expiry())?;
        let guard = LoginGuard::new(store, config.guard_policy());

        Ok(Self {
            config: Arc::new(config),
            tokens,
            accounts: AccountService::new(repository, guard),
            db: None,
            metrics: None,
        })
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[inline]
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    #[inline]
    pub fn db(&self) -> Option<&PgPool> {
        self.db.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::repositories::InMemoryAccountRepository;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.jwt.secret = "test-secret".to_string();
        config
    }

    #[test]
    fn test_missing_secret_fails() {
        let result = AppState::new(
            AppConfig::default(),
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(TokenConfigError::MissingSigningKey)));
    }

    #[tokio::test]
    async fn test_state_clone_is_cheap() {
        let state = AppState::new(
            test_config(),
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();

        // Clone should be O(1) - just Arc increments
        let cloned = state.clone();
        assert!(cloned.db().is_none());
        assert_eq!(cloned.tokens().expiry_secs(), Some(3600));
    }
}
