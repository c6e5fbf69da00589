//! Login attempt guard
//!
//! Tracks failed logins per account in an [`ExpiringStore`]. Reaching the
//! attempt threshold sets a lockout flag. Both entries share a sliding
//! window: every failed attempt pushes their expiry out again, and once the
//! account stops failing they lapse on their own.
//!
//! The guard is mechanism only. Deciding when to check or record attempts is
//! the account service's job.

use crate::cache::{ExpiringStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Failed attempts before an account is locked
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// Lifetime of counter and lockout entries (5 minutes)
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

const LOCKED_VALUE: &str = "true";

/// Login guard errors
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("login guard storage unavailable: {0}")]
    Unavailable(#[from] StoreError),

    #[error("corrupt login attempt counter at {key}: {value:?}")]
    CorruptCounter { key: String, value: String },
}

/// Lockout policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    pub max_attempts: i64,
    pub window: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Per-account failed login tracking
#[derive(Clone)]
pub struct LoginGuard {
    store: Arc<dyn ExpiringStore>,
    policy: GuardPolicy,
}

impl LoginGuard {
    pub fn new(store: Arc<dyn ExpiringStore>, policy: GuardPolicy) -> Self {
        Self { store, policy }
    }

    #[inline]
    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Failed attempts inside the current window; 0 when none are recorded
    pub async fn attempts(&self, account_id: i64) -> Result<i64, GuardError> {
        let key = attempts_key(account_id);
        match self.store.get(&key).await? {
            None => Ok(0),
            Some(value) if value.is_empty() => Ok(0),
            Some(value) => value
                .parse()
                .map_err(|_| GuardError::CorruptCounter { key, value }),
        }
    }

    /// Record a failed attempt, locking the account at the threshold
    ///
    /// Returns the post-increment attempt count.
    pub async fn record_failed_attempt(&self, account_id: i64) -> Result<i64, GuardError> {
        let attempts = self
            .store
            .increment_with_expiry(&attempts_key(account_id), self.policy.window)
            .await?;

        metrics::counter!("auth_login_failures_total").increment(1);

        if attempts >= self.policy.max_attempts {
            self.store
                .set_with_expiry(&blocked_key(account_id), LOCKED_VALUE, self.policy.window)
                .await?;

            metrics::counter!("auth_lockouts_total").increment(1);
            warn!(account_id, attempts, "Account locked after repeated failed logins");
        }

        Ok(attempts)
    }

    /// Whether the account is currently locked out
    pub async fn is_locked(&self, account_id: i64) -> Result<bool, GuardError> {
        let value = self.store.get(&blocked_key(account_id)).await?;
        Ok(value.as_deref() == Some(LOCKED_VALUE))
    }

    /// Forget recorded failures for the account
    pub async fn reset(&self, account_id: i64) -> Result<(), GuardError> {
        self.store.delete(&attempts_key(account_id)).await?;
        Ok(())
    }
}

fn attempts_key(account_id: i64) -> String {
    format!("auth:login_attempts:{}", account_id)
}

fn blocked_key(account_id: i64) -> String {
    format!("auth:login_blocked:{}", account_id)
}
