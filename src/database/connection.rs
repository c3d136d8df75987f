//! Pooled database connection for the inventory.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Handle to the inventory database. Internally pools connections; callers
/// never hold a connection across operations.
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Connect using the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-connected pool (used by tests and embedding binaries
    /// that manage their own pool lifecycle).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the crate's migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| sqlx::Error::from(e).into())
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await?;
        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
