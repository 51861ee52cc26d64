//! Shared helpers for policy store integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use policy_store::{
    ConnectionPool, DatabaseConfig, Destination, DestinationId, DestinationKey, DestinationRepo,
    DestinationTable, Dialect, GroupRepo, GroupTable, IpRange, IpRangeRepo, IpRangeTable,
    Migrator, Policy, PolicyRepo, PolicyStore, PolicyTable, Ports, Repositories, SchemaMigrator,
    SlotId, Source, StoreError, StoreResult, Tx,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn memory_pool() -> ConnectionPool {
    init_tracing();
    ConnectionPool::connect(&DatabaseConfig::in_memory())
        .await
        .expect("open in-memory database")
}

/// SQLite database file under `dir` shared by `connections` pooled
/// connections, so concurrent transactions really contend for it
pub async fn file_pool(dir: &Path, connections: u32) -> ConnectionPool {
    init_tracing();
    let config = DatabaseConfig {
        dialect: Dialect::Sqlite,
        url: format!("sqlite://{}?mode=rwc", dir.join("policies.db").display()),
        max_open_connections: connections,
        max_idle_connections: connections,
        connect_timeout_secs: 30,
    };
    ConnectionPool::connect(&config)
        .await
        .expect("open file database")
}

pub async fn new_store(pool: &ConnectionPool, tag_length: usize) -> PolicyStore {
    store_with_repos(pool, tag_length, Repositories::default()).await
}

pub async fn store_with_repos(pool: &ConnectionPool, tag_length: usize, repos: Repositories) -> PolicyStore {
    PolicyStore::new(pool.clone(), repos, tag_length, &SchemaMigrator::new())
        .await
        .expect("create store")
}

pub async fn count(pool: &ConnectionPool, table: &str) -> i64 {
    let sql = pool.prepare(&format!("SELECT COUNT(*) FROM {table}"));
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool.inner())
        .await
        .expect("count rows")
}

pub async fn claimed_slots(pool: &ConnectionPool) -> i64 {
    let sql = pool.prepare(r#"SELECT COUNT(*) FROM "groups" WHERE guid IS NOT NULL"#);
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool.inner())
        .await
        .expect("count claimed slots")
}

pub async fn max_slot(pool: &ConnectionPool) -> i64 {
    let sql = pool.prepare(r#"SELECT MAX(id) FROM "groups""#);
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool.inner())
        .await
        .expect("max slot id")
}

pub fn app_policy(source: &str, destination: &str, protocol: &str, port: u16) -> Policy {
    Policy {
        source: Source {
            id: source.into(),
            ..Default::default()
        },
        destination: Destination {
            id: destination.into(),
            protocol: protocol.into(),
            port,
            ..Default::default()
        },
    }
}

pub fn ranged_policy(source: &str, destination: &str, protocol: &str, start: u16, end: u16) -> Policy {
    Policy {
        source: Source {
            id: source.into(),
            ..Default::default()
        },
        destination: Destination {
            id: destination.into(),
            protocol: protocol.into(),
            ports: Ports { start, end },
            ..Default::default()
        },
    }
}

pub fn ip_policy(source: &str, destination: &str, start_ip: &str, end_ip: &str) -> Policy {
    Policy {
        source: Source {
            id: source.into(),
            group_type: "app".into(),
            ..Default::default()
        },
        destination: Destination {
            id: destination.into(),
            group_type: "ip".into(),
            protocol: "tcp".into(),
            ports: Ports { start: 8080, end: 9000 },
            ips: vec![IpRange {
                start: start_ip.into(),
                end: end_ip.into(),
            }],
            ..Default::default()
        },
    }
}

/// What an injected fault returns
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Generic database failure carrying this message
    Error(&'static str),
    /// Lookup miss
    NotFound,
}

impl Fault {
    fn into_error(self) -> StoreError {
        match self {
            Fault::Error(msg) => StoreError::Sql(sqlx::Error::Protocol(msg.to_string())),
            Fault::NotFound => StoreError::NotFound,
        }
    }
}

struct Plan {
    on_call: usize,
    calls: usize,
    fault: Fault,
}

/// Per-operation fault plan shared by the faulty repositories
#[derive(Default)]
pub struct Faults {
    plans: Mutex<HashMap<&'static str, Plan>>,
}

impl Faults {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the `on_call`-th (1-based) call of `op` fail
    pub fn fail(&self, op: &'static str, on_call: usize, fault: Fault) {
        self.plans.lock().insert(
            op,
            Plan {
                on_call,
                calls: 0,
                fault,
            },
        );
    }

    fn check(&self, op: &'static str) -> StoreResult<()> {
        let mut plans = self.plans.lock();
        if let Some(plan) = plans.get_mut(op) {
            plan.calls += 1;
            if plan.calls == plan.on_call {
                return Err(plan.fault.into_error());
            }
        }
        Ok(())
    }
}

pub struct FaultyGroups {
    inner: GroupTable,
    faults: Arc<Faults>,
}

#[async_trait]
impl GroupRepo for FaultyGroups {
    async fn claim(&self, tx: &mut Tx, guid: &str, group_type: &str) -> StoreResult<SlotId> {
        self.faults.check("groups.claim")?;
        self.inner.claim(tx, guid, group_type).await
    }

    async fn lookup(&self, tx: &mut Tx, guid: &str) -> StoreResult<SlotId> {
        self.faults.check("groups.lookup")?;
        self.inner.lookup(tx, guid).await
    }

    async fn release(&self, tx: &mut Tx, slot: SlotId) -> StoreResult<()> {
        self.faults.check("groups.release")?;
        self.inner.release(tx, slot).await
    }
}

pub struct FaultyDestinations {
    inner: DestinationTable,
    faults: Arc<Faults>,
}

#[async_trait]
impl DestinationRepo for FaultyDestinations {
    async fn find_or_create(
        &self,
        tx: &mut Tx,
        key: DestinationKey<'_>,
        ip_ranges: &[IpRange],
    ) -> StoreResult<DestinationId> {
        self.faults.check("destinations.find_or_create")?;
        self.inner.find_or_create(tx, key, ip_ranges).await
    }

    async fn lookup(&self, tx: &mut Tx, key: DestinationKey<'_>) -> StoreResult<DestinationId> {
        self.faults.check("destinations.lookup")?;
        self.inner.lookup(tx, key).await
    }

    async fn delete(&self, tx: &mut Tx, id: DestinationId) -> StoreResult<()> {
        self.faults.check("destinations.delete")?;
        self.inner.delete(tx, id).await
    }

    async fn count_referencing(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64> {
        self.faults.check("destinations.count_referencing")?;
        self.inner.count_referencing(tx, group).await
    }
}

pub struct FaultyPolicies {
    inner: PolicyTable,
    faults: Arc<Faults>,
}

#[async_trait]
impl PolicyRepo for FaultyPolicies {
    async fn create(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()> {
        self.faults.check("policies.create")?;
        self.inner.create(tx, source, destination).await
    }

    async fn delete(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()> {
        self.faults.check("policies.delete")?;
        self.inner.delete(tx, source, destination).await
    }

    async fn count_by_destination(&self, tx: &mut Tx, destination: DestinationId) -> StoreResult<i64> {
        self.faults.check("policies.count_by_destination")?;
        self.inner.count_by_destination(tx, destination).await
    }

    async fn count_by_group(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64> {
        self.faults.check("policies.count_by_group")?;
        self.inner.count_by_group(tx, group).await
    }
}

/// Real repositories wrapped with fault injection
pub fn faulty_repos(faults: &Arc<Faults>) -> Repositories {
    let ip_ranges: Arc<dyn IpRangeRepo> = Arc::new(IpRangeTable);
    Repositories {
        groups: Arc::new(FaultyGroups {
            inner: GroupTable,
            faults: faults.clone(),
        }),
        destinations: Arc::new(FaultyDestinations {
            inner: DestinationTable::new(ip_ranges.clone()),
            faults: faults.clone(),
        }),
        policies: Arc::new(FaultyPolicies {
            inner: PolicyTable,
            faults: faults.clone(),
        }),
        ip_ranges,
    }
}

/// Migrator that records its calls and optionally fails or skips the work
pub struct RecordingMigrator {
    inner: Option<SchemaMigrator>,
    failure: Option<&'static str>,
    calls: Mutex<Vec<(Dialect, usize)>>,
}

impl RecordingMigrator {
    /// Records calls and applies the real schema
    pub fn passthrough() -> Self {
        Self {
            inner: Some(SchemaMigrator::new()),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Records calls and applies nothing
    pub fn noop() -> Self {
        Self {
            inner: None,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Records calls and fails with `message`
    pub fn failing(message: &'static str) -> Self {
        Self {
            inner: None,
            failure: Some(message),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Dialect, usize)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Migrator for RecordingMigrator {
    async fn perform_migrations(
        &self,
        dialect: Dialect,
        pool: &ConnectionPool,
        limit: usize,
    ) -> StoreResult<usize> {
        self.calls.lock().push((dialect, limit));
        if let Some(message) = self.failure {
            return Err(StoreError::Config(message.to_string()));
        }
        match &self.inner {
            Some(inner) => inner.perform_migrations(dialect, pool, limit).await,
            None => Ok(0),
        }
    }
}
