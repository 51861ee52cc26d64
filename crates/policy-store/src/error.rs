//! Error types for the policy store

use thiserror::Error;

/// Policy store error type
#[derive(Error, Debug)]
pub enum StoreError {
    /// Tag length outside the supported range
    #[error("tag length out of range (1-3): {0}")]
    InvalidTagLength(usize),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Every slot in the tag pool is claimed
    #[error("failed to find available tag")]
    AllocationExhausted,

    /// Free slots exist but all of them are locked by in-flight claims
    #[error("free tags are held by concurrent transactions")]
    SlotContended,

    /// Row lookup miss
    #[error("record not found")]
    NotFound,

    /// Could not open a transaction
    #[error("begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// Could not commit a transaction
    #[error("commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// Rollback failed after an earlier error
    #[error("database rollback: {source} (sql error: {cause})")]
    Rollback {
        /// Rollback failure
        #[source]
        source: sqlx::Error,
        /// Error that triggered the rollback
        cause: Box<StoreError>,
    },

    /// A schema migration step failed
    #[error("migration {id}: {source}")]
    Migration {
        /// Migration identifier
        id: String,
        /// Underlying failure
        #[source]
        source: sqlx::Error,
    },

    /// Error annotated with the operation stage that produced it
    #[error("{stage}: {source}")]
    Stage {
        /// Failing stage, e.g. "creating group"
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: Box<StoreError>,
    },

    /// Row contained a value the store cannot represent
    #[error("invalid {column} value: {value}")]
    Decode {
        /// Column name
        column: &'static str,
        /// Offending value
        value: i64,
    },

    /// SQL error
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse error
    #[error("parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl StoreError {
    /// Wrap this error with the stage that produced it
    pub fn context(self, stage: &'static str) -> Self {
        StoreError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// True when the root cause is a lookup miss
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound => true,
            StoreError::Stage { source, .. } => source.is_not_found(),
            StoreError::Rollback { cause, .. } => cause.is_not_found(),
            _ => false,
        }
    }

    /// True when the root cause is an exhausted tag pool
    pub fn is_allocation_exhausted(&self) -> bool {
        match self {
            StoreError::AllocationExhausted => true,
            StoreError::Stage { source, .. } => source.is_allocation_exhausted(),
            StoreError::Rollback { cause, .. } => cause.is_allocation_exhausted(),
            _ => false,
        }
    }

    /// True when retrying the whole transaction may succeed
    pub fn is_contended(&self) -> bool {
        match self {
            StoreError::SlotContended => true,
            StoreError::Stage { source, .. } => source.is_contended(),
            StoreError::Rollback { cause, .. } => cause.is_contended(),
            _ => false,
        }
    }

    /// True for construction-time configuration failures
    pub fn is_config(&self) -> bool {
        match self {
            StoreError::InvalidTagLength(_) | StoreError::Config(_) => true,
            StoreError::Stage { source, .. } => source.is_config(),
            StoreError::Rollback { cause, .. } => cause.is_config(),
            _ => false,
        }
    }
}

/// Result type for the policy store
pub type StoreResult<T> = Result<T, StoreError>;
