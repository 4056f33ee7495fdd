//! Opening and provisioning the Postgres store.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::{DbConfig, redact_password};
use crate::postgres::PgStore;

/// Migrations embedded at compile time from `crates/planvault-store/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Pooled connections per store. Bulk reads keep their fan-out below this.
pub const MAX_CONNECTIONS: u32 = 10;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

// Postgres truncates identifiers beyond NAMEDATALEN - 1 bytes.
const MAX_DATABASE_NAME_LEN: usize = 63;

/// Connect to the configured database and apply pending migrations.
pub async fn open_store(config: &DbConfig) -> Result<PgStore> {
    let pool = connect(&config.database_url, MAX_CONNECTIONS).await?;
    run_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}

/// Create the configured database if it is missing, then open it.
pub async fn provision(config: &DbConfig) -> Result<PgStore> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    let db_name = validate_database_name(db_name)?;

    let maintenance = connect(&config.maintenance_url(), 1).await?;
    let created = create_database_if_missing(&maintenance, db_name).await;
    maintenance.close().await;

    if created? {
        info!(db = db_name, "database created");
    } else {
        info!(db = db_name, "database already exists");
    }

    open_store(config).await
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied");
    Ok(())
}

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {}", redact_password(url)))
}

/// Returns `true` when the database had to be created.
async fn create_database_if_missing(maintenance: &PgPool, db_name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(maintenance)
            .await
            .context("failed to query pg_database")?;

    if exists {
        return Ok(false);
    }

    // CREATE DATABASE takes no bind parameters; the name was validated.
    let stmt = format!("CREATE DATABASE \"{db_name}\"");
    maintenance
        .execute(stmt.as_str())
        .await
        .with_context(|| format!("failed to create database {db_name}"))?;
    Ok(true)
}

/// Accept only names that are safe to splice into `CREATE DATABASE`.
fn validate_database_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.len() > MAX_DATABASE_NAME_LEN {
        anyhow::bail!("database name {name:?} must be 1-{MAX_DATABASE_NAME_LEN} characters");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("database name {name:?} contains invalid characters");
    }
    Ok(name)
}
