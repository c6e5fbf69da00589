//! Account repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::fmt;
use thiserror::Error;

/// Account record from database
#[derive(Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Input for creating an account
#[derive(Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Unique column hit by a conflicting insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

/// Repository errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("account with this {0:?} already exists")]
    UniqueViolation(UniqueField),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Account storage
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError>;

    /// Insert a new account; fails with `UniqueViolation` when the email or
    /// username is taken
    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError>;
}

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, created_at
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, username, password_hash, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, username, password_hash, created_at
            "#,
        )
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_insert_error)
    }
}

/// Map unique-constraint violations to the column they guard
fn classify_insert_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("accounts_email_key") => {
                    return RepositoryError::UniqueViolation(UniqueField::Email)
                }
                Some("accounts_username_key") => {
                    return RepositoryError::UniqueViolation(UniqueField::Username)
                }
                _ => {}
            }
        }
    }
    RepositoryError::Database(err)
}
