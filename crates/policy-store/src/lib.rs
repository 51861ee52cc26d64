//! Network Policy Store
//!
//! Authoritative record of which groups (apps, spaces, IP ranges) may send
//! traffic to which destinations, plus the bounded tag space the dataplane
//! uses to mark packets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         POLICY STORE                                │
//! │        create / delete (one transaction per batch) | all | by_guids │
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────┐  │
//! │  │    Group     │  │ Destination  │  │   Policy     │  │IP Range │  │
//! │  │  Allocator   │  │  Repository  │  │  Repository  │  │  Repo   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └────┬────┘  │
//! │         └─────────────────┴───────┬─────────┴───────────────┘       │
//! │                                   ▼                                 │
//! │              Tx (explicit transaction handle, per call)             │
//! │                                   │                                 │
//! │  ┌────────────────────────────────▼──────────────────────────────┐  │
//! │  │        SqlDialect: PostgreSQL | MySQL | SQLite (sqlx Any)     │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tag space is a pre-populated `groups` table of `2^(tag_length*8) - 1`
//! rows. Claiming and releasing a tag are ordinary row updates inside the
//! caller's transaction, so several store instances can share one database.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod db;
pub mod destinations;
pub mod dialect;
pub mod error;
pub mod groups;
pub mod ip_ranges;
pub mod migrations;
pub mod models;
pub mod policies;
pub mod store;
pub mod tag_store;

pub use config::{DatabaseConfig, StoreConfig};
pub use db::{ConnectionPool, Tx};
pub use destinations::{DestinationKey, DestinationRepo, DestinationTable};
pub use dialect::{Dialect, SqlDialect};
pub use error::{StoreError, StoreResult};
pub use groups::{GroupRepo, GroupTable};
pub use ip_ranges::{IpRangeRepo, IpRangeTable};
pub use migrations::{Migrator, SchemaMigrator};
pub use models::*;
pub use policies::{PolicyRepo, PolicyTable};
pub use store::{PolicyStore, Repositories};
pub use tag_store::TagStore;
