//! Database connection and pool management
//!
//! Pool sizing, timeouts and lifetimes all come from [`DatabaseConfig`];
//! connections are tested before being handed out.

use crate::config::DatabaseConfig;
use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Create a PostgreSQL connection pool from the `database` config section
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let connect_options =
        PgConnectOptions::from_str(&config.url)?.application_name("account-manager");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await?;

    info!(
        max = config.max_connections,
        min = config.min_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// Apply the embedded `accounts` migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Check database health
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            warn!(error = %e, "Database health check failed");
            e.into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            ..AppConfig::default().database
        };
        assert!(create_pool(&config).await.is_err());
    }
}
