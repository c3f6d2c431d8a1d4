use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{fmt, str::FromStr, time::Duration};
use tracing::info;

use crate::database::infrastructure::postgres::{
    PostgresCheckRepository, PostgresFindingRepository, PostgresProviderRepository,
    PostgresScanRepository,
};
use crate::error::{CoreError, Result};

/// Statistics about the connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
}

/// Owner of the PostgreSQL pool plus one repository per aggregate.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
    providers: PostgresProviderRepository,
    checks: PostgresCheckRepository,
    scans: PostgresScanRepository,
    findings: PostgresFindingRepository,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let connect_options = PgConnectOptions::from_str(connection_string)
            .map_err(|e| CoreError::Internal(format!("Invalid DATABASE_URL: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .map_err(|e| CoreError::Internal(format!("Database connection failed: {e}")))?;

        info!(max_connections, "Database pool initialized");
        Ok(Self::from_pool(pool, max_connections))
    }

    /// Wrap an existing pool, e.g. the one handed out by `#[sqlx::test]`.
    pub fn from_pool(pool: PgPool, max_connections: u32) -> Self {
        Self {
            providers: PostgresProviderRepository::new(pool.clone()),
            checks: PostgresCheckRepository::new(pool.clone()),
            scans: PostgresScanRepository::new(pool.clone()),
            findings: PostgresFindingRepository::new(pool.clone()),
            pool,
            max_connections,
        }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("Migration failed: {e}")))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.max_connections,
        }
    }

    pub fn providers(&self) -> &PostgresProviderRepository {
        &self.providers
    }

    pub fn checks(&self) -> &PostgresCheckRepository {
        &self.checks
    }

    pub fn scans(&self) -> &PostgresScanRepository {
        &self.scans
    }

    pub fn findings(&self) -> &PostgresFindingRepository {
        &self.findings
    }
}
