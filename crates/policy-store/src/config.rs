//! Store configuration

use crate::dialect::Dialect;
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};

/// Policy store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Tag width in bytes (1-3); the pool holds `2^(tag_length*8) - 1` tags
    pub tag_length: usize,
    /// Database connection settings
    pub database: DatabaseConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tag_length: 1,
            database: DatabaseConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load from a JSON file
    pub fn load(path: &str) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &str) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Database connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQL dialect of the target database
    pub dialect: Dialect,
    /// Connection URL
    pub url: String,
    /// Upper bound on pooled connections
    pub max_open_connections: u32,
    /// Connections kept open while idle
    pub max_idle_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            url: "postgres://localhost/network_policy".into(),
            max_open_connections: 200,
            max_idle_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Embedded SQLite database living only as long as its pool
    pub fn in_memory() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            url: "sqlite::memory:".into(),
            max_open_connections: 1,
            max_idle_connections: 1,
            connect_timeout_secs: 30,
        }
    }

    /// True for a private in-memory SQLite database
    pub fn is_in_memory(&self) -> bool {
        self.dialect == Dialect::Sqlite && self.url.contains(":memory:")
    }
}

// The URL may carry credentials.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("url", &"[REDACTED]")
            .field("max_open_connections", &self.max_open_connections)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}
