//! # Rollcall DB
//!
//! PostgreSQL pool initialisation and the embedded migration set.
//!
//! ```ignore
//! let pool = rollcall_db::init_db_pool().await?;
//! rollcall_db::run_migrations(&pool).await?;
//! ```

use std::env;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

pub use sqlx::PgPool;

/// Error raised while connecting or migrating.
#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("DATABASE_URL must be set")]
    MissingUrl,
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("Failed to run migrations: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

/// Connects to `DATABASE_URL`. Pool size comes from `DB_MAX_CONNECTIONS`
/// (default 10).
pub async fn init_db_pool() -> Result<PgPool, DbInitError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbInitError::MissingUrl)?;
    let max_connections = env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .map_err(DbInitError::Connect)?;

    info!(max_connections, "Database pool ready");
    Ok(pool)
}

/// Applies the migrations under the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbInitError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(DbInitError::Migrate)?;
    info!("Database migrations applied");
    Ok(())
}
