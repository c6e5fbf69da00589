//! Account Manager Backend
//!
//! Registration, login and bearer-token authentication with a
//! brute-force login guard.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! - Routes: per-route middleware sets wrapping request handlers
//! - Services: account registration and login
//! - Repositories: account persistence (PostgreSQL with SQLx)
//! - Cache: expiring counters for the login guard (Redis)

use account_manager_backend::{
    cache::{ExpiringStore, MemoryStore, RedisStore},
    config, db,
    repositories::PgAccountRepository,
    routes,
    state::AppState,
};
use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the in-memory fallback store drops expired entries
const MEMORY_STORE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = config::AppConfig::load()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = if config::AppConfig::is_production() { "production" } else { "development" },
        "Starting Account Manager Backend"
    );

    if config::AppConfig::is_production() {
        validate_production_config(&config)?;
    }

    info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database).await?;

    // Run migrations (skip in production if using separate migration job)
    if !config::AppConfig::is_production() {
        db::run_migrations(&db_pool).await?;
    }

    let store = connect_store(&config.redis.url).await;

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let state = AppState::new(
        config.clone(),
        Arc::new(PgAccountRepository::new(db_pool.clone())),
        store,
    )
    .map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?
    .with_database(db_pool)
    .with_metrics(metrics);

    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(address = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Connect to Redis, falling back to an in-process store
///
/// The fallback keeps login attempt counters per process only, so lockouts
/// are not shared between replicas.
async fn connect_store(url: &str) -> Arc<dyn ExpiringStore> {
    info!("Connecting to Redis...");

    match RedisStore::connect(url).await {
        Ok(store) => {
            info!("Redis connection established");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                "Failed to connect to Redis: {}. Login attempts will be tracked in memory.",
                e
            );
            let store = MemoryStore::new();
            spawn_purge_task(store.clone());
            Arc::new(store)
        }
    }
}

fn spawn_purge_task(store: MemoryStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_STORE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_expired().await;
        }
    });
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config::AppConfig::is_production() {
            "account_manager_backend=info,tower_http=info".into()
        } else {
            "account_manager_backend=debug,tower_http=debug,sqlx=warn".into()
        }
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config::AppConfig::is_production() {
        // JSON logging for production (better for log aggregation)
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Validate configuration for production deployment
fn validate_production_config(config: &config::AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.jwt.secret.contains("development") || config.jwt.secret.len() < 32 {
        errors.push("JWT secret must be at least 32 characters and not contain 'development'");
    }

    if config.guard.max_attempts < 1 || config.guard.window_secs == 0 {
        errors.push("Login guard needs at least one attempt and a non-zero window");
    }

    if config.database.url.contains("localhost") || config.database.url.contains("127.0.0.1") {
        warn!("Database URL contains localhost - ensure this is intentional for production");
    }

    if !errors.is_empty() {
        for err in &errors {
            error!("Configuration error: {}", err);
        }
        anyhow::bail!("Invalid production configuration");
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
