use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the query helpers
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pool construction and liveness checks for the application database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Build the pool without opening a connection.
    ///
    /// The server starts even when the database is down; requests that need it
    /// fail individually and `/api/health` reports the outage.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&config.url)?;

        info!(
            "Database pool configured (max_connections={}, timeout={}s)",
            config.max_connections, config.connection_timeout
        );
        Ok(pool)
    }

    /// Open a pool and verify connectivity immediately (CLI use)
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let pool = Self::connect_lazy(config)?;
        Self::health_check(&pool).await?;
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
