//! Account service for registration and login
//!
//! Owns the business rules around accounts: email and username uniqueness,
//! lockout enforcement, and the order in which credentials are checked.
//!
//! # Performance
//!
//! Password hashing/verification runs on the blocking thread pool.

use crate::auth::{CredentialHasher, GuardError, HashError, LoginGuard};
use crate::repositories::{
    Account, AccountRepository, NewAccount, RepositoryError, UniqueField,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Account operation errors
#[derive(Error, Debug)]
pub enum AccountError {
    /// The email is already registered; carries the existing account
    #[error("duplicate_user_email")]
    DuplicateEmail(Option<Box<Account>>),

    /// The username is already registered; carries the existing account
    #[error("duplicate_user_username")]
    DuplicateUsername(Option<Box<Account>>),

    #[error("account not found")]
    AccountNotFound,

    #[error("invalid_password")]
    InvalidPassword,

    #[error("login_blocked")]
    LoginBlocked,

    #[error("credential verification failed: {0}")]
    CredentialVerification(#[source] HashError),

    #[error("failed to hash password: {0}")]
    Hashing(#[source] HashError),

    #[error("login guard unavailable: {0}")]
    GuardUnavailable(#[from] GuardError),

    #[error("persistence error: {0}")]
    Persistence(#[source] RepositoryError),
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    guard: LoginGuard,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>, guard: LoginGuard) -> Self {
        Self { repository, guard }
    }

    /// Register a new account
    ///
    /// Email uniqueness is checked before username uniqueness, and both
    /// before anything is hashed or written.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        if let Some(existing) = self
            .repository
            .find_by_email(email)
            .await
            .map_err(AccountError::Persistence)?
        {
            return Err(AccountError::DuplicateEmail(Some(Box::new(existing))));
        }

        if let Some(existing) = self
            .repository
            .find_by_username(username)
            .await
            .map_err(AccountError::Persistence)?
        {
            return Err(AccountError::DuplicateUsername(Some(Box::new(existing))));
        }

        let password_hash = CredentialHasher::hash_async(password.to_string())
            .await
            .map_err(AccountError::Hashing)?;

        let account = self
            .repository
            .create(NewAccount {
                email: email.to_string(),
                username: username.to_string(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                // Lost a race with a concurrent registration
                RepositoryError::UniqueViolation(UniqueField::Email) => {
                    AccountError::DuplicateEmail(None)
                }
                RepositoryError::UniqueViolation(UniqueField::Username) => {
                    AccountError::DuplicateUsername(None)
                }
                other => AccountError::Persistence(other),
            })?;

        metrics::counter!("auth_registrations_total").increment(1);
        info!(account_id = account.id, "Account registered");

        Ok(account)
    }

    /// Log in with a username or email address
    ///
    /// The identifier is matched against usernames first and emails second.
    /// A locked account is refused before its password is looked at.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Account, AccountError> {
        let account = self
            .resolve(identifier)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        if self.guard.is_locked(account.id).await? {
            debug!(account_id = account.id, "Login refused for locked account");
            return Err(AccountError::LoginBlocked);
        }

        let valid =
            CredentialHasher::verify_async(password.to_string(), account.password_hash.clone())
                .await
                .map_err(AccountError::CredentialVerification)?;

        if !valid {
            self.guard.record_failed_attempt(account.id).await?;
            return Err(AccountError::InvalidPassword);
        }

        self.guard.reset(account.id).await?;
        metrics::counter!("auth_logins_total").increment(1);

        Ok(account)
    }

    /// Load an account by id
    pub async fn profile(&self, id: i64) -> Result<Account, AccountError> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(AccountError::Persistence)?
            .ok_or(AccountError::AccountNotFound)
    }

    async fn resolve(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        if let Some(account) = self
            .repository
            .find_by_username(identifier)
            .await
            .map_err(AccountError::Persistence)?
        {
            return Ok(Some(account));
        }

        self.repository
            .find_by_email(identifier)
            .await
            .map_err(AccountError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::GuardPolicy;
    use crate::cache::MemoryStore;
    use crate::repositories::InMemoryAccountRepository;
    use async_trait::async_trait;

    const PASSWORD: &str = "correct horse battery";

    fn create_test_service() -> (AccountService, InMemoryAccountRepository, LoginGuard) {
        let repo = InMemoryAccountRepository::new();
        let guard = LoginGuard::new(Arc::new(MemoryStore::new()), GuardPolicy::default());
        let service = AccountService::new(Arc::new(repo.clone()), guard.clone());
        (service, repo, guard)
    }

    async fn register_alice(service: &AccountService) -> Account {
        service
            .register("alice@example.com", "alice", PASSWORD)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_persists_hashed_password() {
        let (service, repo, _) = create_test_service();
        let account = register_alice(&service).await;

        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.username, "alice");
        assert_ne!(account.password_hash, PASSWORD);
        assert!(CredentialHasher::verify(PASSWORD, &account.password_hash).unwrap());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (service, repo, _) = create_test_service();
        let first = register_alice(&service).await;

        let err = service
            .register("alice@example.com", "alice2", PASSWORD)
            .await
            .unwrap_err();

        match err {
            AccountError::DuplicateEmail(Some(existing)) => assert_eq!(existing.id, first.id),
            other => panic!("expected DuplicateEmail, got {:?}", other),
        }
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let (service, repo, _) = create_test_service();
        register_alice(&service).await;

        let err = service
            .register("other@example.com", "alice", PASSWORD)
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::DuplicateUsername(Some(_))));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_email_conflict_reported_before_username_conflict() {
        let (service, _, _) = create_test_service();
        register_alice(&service).await;

        let err = service
            .register("alice@example.com", "alice", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_login_by_username_and_email() {
        let (service, _, _) = create_test_service();
        let account = register_alice(&service).await;

        assert_eq!(service.login("alice", PASSWORD).await.unwrap().id, account.id);
        assert_eq!(
            service.login("alice@example.com", PASSWORD).await.unwrap().id,
            account.id
        );
    }

    #[tokio::test]
    async fn test_login_prefers_username_match() {
        let (service, repo, _) = create_test_service();
        // Seeded directly: request validation would reject this username
        let hash = CredentialHasher::hash(PASSWORD, &CredentialHasher::generate_salt()).unwrap();
        let by_username = repo
            .create(NewAccount {
                email: "first@example.com".to_string(),
                username: "shared@example.com".to_string(),
                password_hash: hash.clone(),
            })
            .await
            .unwrap();
        repo.create(NewAccount {
            email: "shared@example.com".to_string(),
            username: "second".to_string(),
            password_hash: hash,
        })
        .await
        .unwrap();

        let account = service.login("shared@example.com", PASSWORD).await.unwrap();
        assert_eq!(account.id, by_username.id);
    }

    #[tokio::test]
    async fn test_login_unknown_account() {
        let (service, _, _) = create_test_service();
        assert!(matches!(
            service.login("nobody", PASSWORD).await,
            Err(AccountError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_records_attempt() {
        let (service, _, guard) = create_test_service();
        let account = register_alice(&service).await;

        assert!(matches!(
            service.login("alice", "wrong password").await,
            Err(AccountError::InvalidPassword)
        ));
        assert_eq!(guard.attempts(account.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lockout_after_three_failures_blocks_correct_password() {
        let (service, _, guard) = create_test_service();
        let account = register_alice(&service).await;

        for _ in 0..3 {
            assert!(matches!(
                service.login("alice", "wrong password").await,
                Err(AccountError::InvalidPassword)
            ));
        }

        assert!(guard.is_locked(account.id).await.unwrap());
        assert!(matches!(
            service.login("alice", PASSWORD).await,
            Err(AccountError::LoginBlocked)
        ));
        // Blocked attempts are not counted
        assert_eq!(guard.attempts(account.id).await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_lapses_after_window() {
        let (service, _, guard) = create_test_service();
        register_alice(&service).await;
        for _ in 0..3 {
            let _ = service.login("alice", "wrong password").await;
        }

        tokio::time::advance(guard.policy().window + std::time::Duration::from_secs(1)).await;

        assert!(service.login("alice", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_successful_login_resets_counter() {
        let (service, _, guard) = create_test_service();
        let account = register_alice(&service).await;

        for _ in 0..2 {
            let _ = service.login("alice", "wrong password").await;
        }
        service.login("alice", PASSWORD).await.unwrap();
        assert_eq!(guard.attempts(account.id).await.unwrap(), 0);

        // Two more failures must not lock after the reset
        for _ in 0..2 {
            let _ = service.login("alice", "wrong password").await;
        }
        assert!(!guard.is_locked(account.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_stored_hash() {
        let (service, repo, _) = create_test_service();
        repo.create(NewAccount {
            email: "broken@example.com".to_string(),
            username: "broken".to_string(),
            password_hash: "no-delimiter".to_string(),
        })
        .await
        .unwrap();

        assert!(matches!(
            service.login("broken", PASSWORD).await,
            Err(AccountError::CredentialVerification(HashError::MalformedHash))
        ));
    }

    #[tokio::test]
    async fn test_profile() {
        let (service, _, _) = create_test_service();
        let account = register_alice(&service).await;

        assert_eq!(service.profile(account.id).await.unwrap().username, "alice");
        assert!(matches!(
            service.profile(account.id + 1).await,
            Err(AccountError::AccountNotFound)
        ));
    }

    /// Repository that reports free keys on lookup but rejects the insert,
    /// as when a concurrent registration wins the race
    struct RacingRepository(UniqueField);

    #[async_trait]
    impl AccountRepository for RacingRepository {
        async fn find_by_email(&self, _: &str) -> Result<Option<Account>, RepositoryError> {
            Ok(None)
        }

        async fn find_by_username(&self, _: &str) -> Result<Option<Account>, RepositoryError> {
            Ok(None)
        }

        async fn find_by_id(&self, _: i64) -> Result<Option<Account>, RepositoryError> {
            Ok(None)
        }

        async fn create(&self, _: NewAccount) -> Result<Account, RepositoryError> {
            Err(RepositoryError::UniqueViolation(self.0))
        }
    }

    #[tokio::test]
    async fn test_insert_race_maps_to_duplicate() {
        let guard = LoginGuard::new(Arc::new(MemoryStore::new()), GuardPolicy::default());
        let service = AccountService::new(Arc::new(RacingRepository(UniqueField::Username)), guard);

        assert!(matches!(
            service.register("a@example.com", "alice", PASSWORD).await,
            Err(AccountError::DuplicateUsername(None))
        ));
    }
}
