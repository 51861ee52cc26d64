//! Schema migrations
//!
//! Ordered DDL steps per dialect. Applied ids are recorded in
//! `schema_migrations`, so running the migrator again is a no-op.

mod schema;

use crate::db::ConnectionPool;
use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use tracing::info;

pub use schema::MIGRATIONS;

/// One versioned schema step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Unique, ordered identifier
    pub id: &'static str,
    /// PostgreSQL statements
    pub postgres: &'static [&'static str],
    /// MySQL statements
    pub mysql: &'static [&'static str],
    /// SQLite statements
    pub sqlite: &'static [&'static str],
}

impl Migration {
    /// Statements for a dialect
    pub fn statements(&self, dialect: Dialect) -> &'static [&'static str] {
        match dialect {
            Dialect::Postgres => self.postgres,
            Dialect::Mysql => self.mysql,
            Dialect::Sqlite => self.sqlite,
        }
    }
}

/// Brings the schema to the latest version
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Apply pending migrations in order; `limit == 0` applies all of them.
    /// Returns the number applied.
    async fn perform_migrations(
        &self,
        dialect: Dialect,
        pool: &ConnectionPool,
        limit: usize,
    ) -> StoreResult<usize>;
}

/// Migrator over the built-in migration list
#[derive(Debug, Clone, Copy)]
pub struct SchemaMigrator {
    migrations: &'static [Migration],
}

impl SchemaMigrator {
    /// Migrator for the built-in schema
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS,
        }
    }

    /// Migrator for an explicit migration list
    pub fn with_migrations(migrations: &'static [Migration]) -> Self {
        Self { migrations }
    }
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Migrator for SchemaMigrator {
    async fn perform_migrations(
        &self,
        dialect: Dialect,
        pool: &ConnectionPool,
        limit: usize,
    ) -> StoreResult<usize> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id VARCHAR(255) NOT NULL PRIMARY KEY,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool.inner())
        .await?;

        let applied: Vec<String> = sqlx::query_scalar::<_, String>("SELECT id FROM schema_migrations")
            .fetch_all(pool.inner())
            .await?;

        let mut count = 0;
        for migration in self.migrations {
            if applied.iter().any(|id| id == migration.id) {
                continue;
            }
            if limit > 0 && count >= limit {
                break;
            }

            let mut tx = pool.begin().await?;
            for statement in migration.statements(dialect) {
                sqlx::query(statement)
                    .execute(tx.conn())
                    .await
                    .map_err(|source| StoreError::Migration {
                        id: migration.id.to_string(),
                        source,
                    })?;
            }
            let record = tx.prepare("INSERT INTO schema_migrations (id) VALUES (?)");
            sqlx::query(&record)
                .bind(migration.id)
                .execute(tx.conn())
                .await?;
            tx.commit().await?;

            info!(migration = migration.id, dialect = %dialect, "applied schema migration");
            count += 1;
        }

        Ok(count)
    }
}
