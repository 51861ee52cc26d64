//! Connection pool and explicit transaction handle

use crate::config::DatabaseConfig;
use crate::dialect::{Dialect, SqlDialect};
use crate::error::{StoreError, StoreResult};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyConnection, AnyPool};
use sqlx::Any;
use std::time::Duration;
use tracing::debug;

/// Pool of database connections tagged with their dialect
#[derive(Clone)]
pub struct ConnectionPool {
    pool: AnyPool,
    dialect: Dialect,
}

impl ConnectionPool {
    /// Connect using the given settings
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_open_connections.max(1))
            .min_connections(config.max_idle_connections.min(config.max_open_connections))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        // Every connection to `:memory:` opens a fresh database, so the pool
        // must hold exactly one connection for its whole lifetime.
        if config.is_in_memory() {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Config(format!("connect to {} database: {}", config.dialect, e)))?;

        debug!(dialect = %config.dialect, "connected to database");
        Ok(Self::from_pool(pool, config.dialect))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// Configured dialect
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Adapt a portable query to this pool's dialect
    pub fn prepare(&self, query: &str) -> String {
        self.dialect.sql().prepare(query)
    }

    /// Underlying sqlx pool
    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Open a transaction
    pub async fn begin(&self) -> StoreResult<Tx> {
        let inner = self.pool.begin().await.map_err(StoreError::Begin)?;
        Ok(Tx {
            inner,
            dialect: self.dialect,
        })
    }

    /// Close every connection; later calls fail
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open transaction threaded through every repository call
pub struct Tx {
    inner: sqlx::Transaction<'static, Any>,
    dialect: Dialect,
}

impl Tx {
    /// Dialect of the connection
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Dialect strategy of the connection
    pub fn sql(&self) -> &'static dyn SqlDialect {
        self.dialect.sql()
    }

    /// Adapt a portable query to this connection's dialect
    pub fn prepare(&self, query: &str) -> String {
        self.dialect.sql().prepare(query)
    }

    /// Connection to execute statements on
    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut *self.inner
    }

    /// Commit
    pub async fn commit(self) -> StoreResult<()> {
        self.inner.commit().await.map_err(StoreError::Commit)
    }

    /// Roll back
    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.inner.rollback().await
    }
}
