//! Courier webhook delivery service.
//!
//! Main entry point for the delivery daemon. Initializes logging,
//! configuration, the database pool and schema, then runs the delivery
//! engine until a shutdown signal arrives.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use courier_core::RealClock;
use courier_delivery::{storage::PostgresDeliveryStorage, DeliveryEngine};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod config;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting Courier webhook delivery service");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        worker_count = config.worker_count,
        max_retries = config.max_retries,
        "Configuration loaded"
    );

    let pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&pool).await?;
    info!("Database schema ready");

    let storage = Arc::new(courier_core::storage::Storage::new(pool.clone()));
    let delivery_storage = Arc::new(PostgresDeliveryStorage::new(storage));

    let mut engine = DeliveryEngine::new(
        delivery_storage,
        config.to_engine_config(),
        Arc::new(RealClock::new()),
    )?;
    engine.start()?;

    info!("Courier is ready to deliver webhooks");

    shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown");

    engine.shutdown().await?;

    pool.close().await;
    info!("Database connections closed");

    info!("Courier shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,courier=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with startup retries.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Ensures the delivery schema exists.
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS destinations (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL,
            secret TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create destinations table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id UUID PRIMARY KEY,
            destination_id UUID NOT NULL REFERENCES destinations(id) ON DELETE CASCADE,
            payload JSONB NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create events table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS delivery_attempts (
            id UUID PRIMARY KEY,
            event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            response_status_code INTEGER NOT NULL,
            response_body TEXT,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create delivery_attempts table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_events_destination
        ON events(destination_id, created_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create events destination index")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_events_open_status
        ON events(status, created_at)
        WHERE status IN ('pending', 'processing')
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create events status index")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_delivery_attempts_event
        ON delivery_attempts(event_id, timestamp)
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create delivery_attempts index")?;

    Ok(())
}

/// Waits for a shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
