//! Policy store - transactional orchestration of the repositories
//!
//! Every `create`/`delete` batch runs in exactly one transaction and ends
//! either committed or rolled back. Reads are single join queries outside any
//! transaction.

use crate::db::{ConnectionPool, Tx};
use crate::destinations::{DestinationKey, DestinationRepo, DestinationTable};
use crate::error::{StoreError, StoreResult};
use crate::groups::{GroupRepo, GroupTable};
use crate::ip_ranges::{IpRangeRepo, IpRangeTable};
use crate::migrations::Migrator;
use crate::models::{
    group_type_or_default, Destination, IpRange, Policy, Ports, SlotId, Source, TagLength,
};
use crate::policies::{PolicyRepo, PolicyTable};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rows inserted per statement while filling the tag pool
const POPULATE_BATCH: i64 = 1000;

const POLICY_COLUMNS: &str = r#"
    SELECT
        COALESCE(src_grp.guid, ''),
        COALESCE(src_grp.id, 0),
        COALESCE(src_grp.type, ''),
        COALESCE(dst_grp.guid, ''),
        COALESCE(dst_grp.id, 0),
        COALESCE(dst_grp.type, ''),
        COALESCE(ip_ranges.start_ip, ''),
        COALESCE(ip_ranges.end_ip, ''),
        destinations.port,
        destinations.start_port,
        destinations.end_port,
        destinations.protocol
    FROM policies
    LEFT OUTER JOIN "groups" AS src_grp ON (policies.group_id = src_grp.id)
    LEFT OUTER JOIN destinations ON (destinations.id = policies.destination_id)
    LEFT OUTER JOIN "groups" AS dst_grp ON (destinations.group_id = dst_grp.id)
    LEFT OUTER JOIN ip_ranges ON (ip_ranges.group_id = dst_grp.id)"#;

/// Repositories the store drives
#[derive(Clone)]
pub struct Repositories {
    /// Tag pool
    pub groups: Arc<dyn GroupRepo>,
    /// Destinations
    pub destinations: Arc<dyn DestinationRepo>,
    /// Policy join rows
    pub policies: Arc<dyn PolicyRepo>,
    /// Destination IP ranges
    pub ip_ranges: Arc<dyn IpRangeRepo>,
}

impl Default for Repositories {
    fn default() -> Self {
        let ip_ranges: Arc<dyn IpRangeRepo> = Arc::new(IpRangeTable);
        Self {
            groups: Arc::new(GroupTable),
            destinations: Arc::new(DestinationTable::new(ip_ranges.clone())),
            policies: Arc::new(PolicyTable),
            ip_ranges,
        }
    }
}

/// Transactional policy store
#[derive(Clone)]
pub struct PolicyStore {
    pool: ConnectionPool,
    repos: Repositories,
    tag_length: TagLength,
}

impl PolicyStore {
    /// Validate the tag length, migrate the schema and fill the tag pool
    pub async fn new(
        pool: ConnectionPool,
        repos: Repositories,
        tag_length: usize,
        migrator: &dyn Migrator,
    ) -> StoreResult<Self> {
        let tag_length = initialize(&pool, tag_length, migrator).await?;
        Ok(Self {
            pool,
            repos,
            tag_length,
        })
    }

    /// Configured tag length
    pub fn tag_length(&self) -> TagLength {
        self.tag_length
    }

    /// Connection pool
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Liveness probe
    pub async fn check_database(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(self.pool.inner()).await?;
        Ok(())
    }

    /// Store a batch of policies, all or nothing
    pub async fn create(&self, policies: &[Policy]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for policy in policies {
            let result = self.create_policy(&mut tx, policy).await;
            if let Err(err) = result {
                warn!(error = %err, source = %policy.source.id, "policy create failed, rolling back");
                return Err(rollback(tx, err).await);
            }
        }

        tx.commit().await?;
        info!(count = policies.len(), "created policies");
        Ok(())
    }

    async fn create_policy(&self, tx: &mut Tx, policy: &Policy) -> StoreResult<()> {
        let source_group = self
            .repos
            .groups
            .claim(tx, &policy.source.id, group_type_or_default(&policy.source.group_type))
            .await
            .map_err(|e| e.context("creating group"))?;

        let destination = &policy.destination;
        let destination_group = self
            .repos
            .groups
            .claim(tx, &destination.id, group_type_or_default(&destination.group_type))
            .await
            .map_err(|e| e.context("creating group"))?;

        let destination_id = self
            .repos
            .destinations
            .find_or_create(tx, destination_key(destination_group, destination), &destination.ips)
            .await
            .map_err(|e| e.context("creating destination"))?;

        self.repos
            .policies
            .create(tx, source_group, destination_id)
            .await
            .map_err(|e| e.context("creating policy"))
    }

    /// Remove a batch of policies, reclaiming unreferenced destinations and
    /// tags. Policies that no longer exist are skipped.
    pub async fn delete(&self, policies: &[Policy]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for policy in policies {
            let result = self.delete_policy(&mut tx, policy).await;
            if let Err(err) = result {
                warn!(error = %err, source = %policy.source.id, "policy delete failed, rolling back");
                return Err(rollback(tx, err).await);
            }
        }

        tx.commit().await?;
        info!(count = policies.len(), "deleted policies");
        Ok(())
    }

    async fn delete_policy(&self, tx: &mut Tx, policy: &Policy) -> StoreResult<()> {
        let source_group = match self.repos.groups.lookup(tx, &policy.source.id).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => return skip(policy, "source group"),
            Err(e) => return Err(e.context("getting source id")),
        };

        let destination = &policy.destination;
        let destination_group = match self.repos.groups.lookup(tx, &destination.id).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => return skip(policy, "destination group"),
            Err(e) => return Err(e.context("getting destination group id")),
        };

        let key = destination_key(destination_group, destination);
        let destination_id = match self.repos.destinations.lookup(tx, key).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => return skip(policy, "destination"),
            Err(e) => return Err(e.context("getting destination id")),
        };

        match self.repos.policies.delete(tx, source_group, destination_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return skip(policy, "policy"),
            Err(e) => return Err(e.context("deleting policy")),
        }

        let remaining = self
            .repos
            .policies
            .count_by_destination(tx, destination_id)
            .await
            .map_err(|e| e.context("counting destination id"))?;
        if remaining == 0 {
            self.repos
                .destinations
                .delete(tx, destination_id)
                .await
                .map_err(|e| e.context("deleting destination"))?;
        }

        self.release_if_unreferenced(tx, source_group)
            .await
            .map_err(|e| e.context("deleting group row"))?;
        self.release_if_unreferenced(tx, destination_group)
            .await
            .map_err(|e| e.context("deleting group row"))
    }

    async fn release_if_unreferenced(&self, tx: &mut Tx, group: SlotId) -> StoreResult<()> {
        let policies = self.repos.policies.count_by_group(tx, group).await?;
        let destinations = self.repos.destinations.count_referencing(tx, group).await?;

        if policies == 0 && destinations == 0 {
            self.repos.ip_ranges.delete_by_group(tx, group).await?;
            self.repos.groups.release(tx, group).await?;
        }
        Ok(())
    }

    /// Every stored policy
    pub async fn all(&self) -> StoreResult<Vec<Policy>> {
        let query = format!("{POLICY_COLUMNS} ORDER BY policies.id");
        self.policies_query(&query, &[]).await
    }

    /// Policies whose source is in `source_guids` and/or whose destination is
    /// in `destination_guids`. With `intersect` both conditions must hold,
    /// otherwise either one suffices.
    pub async fn by_guids(
        &self,
        source_guids: &[String],
        destination_guids: &[String],
        intersect: bool,
    ) -> StoreResult<Vec<Policy>> {
        if source_guids.is_empty() && destination_guids.is_empty() {
            return Ok(Vec::new());
        }

        let mut wheres = Vec::new();
        if !source_guids.is_empty() {
            wheres.push(format!("src_grp.guid IN ({})", question_marks(source_guids.len())));
        }
        if !destination_guids.is_empty() {
            wheres.push(format!("dst_grp.guid IN ({})", question_marks(destination_guids.len())));
        }
        let joiner = if intersect { " AND " } else { " OR " };
        let query = format!(
            "{POLICY_COLUMNS} WHERE {} ORDER BY policies.id",
            wheres.join(joiner)
        );

        let bindings: Vec<&str> = source_guids
            .iter()
            .chain(destination_guids.iter())
            .map(String::as_str)
            .collect();
        self.policies_query(&query, &bindings).await
    }

    async fn policies_query(&self, query: &str, bindings: &[&str]) -> StoreResult<Vec<Policy>> {
        let sql = self.pool.prepare(query);
        let mut statement = sqlx::query(&sql);
        for guid in bindings {
            statement = statement.bind(*guid);
        }

        let rows = statement
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| StoreError::from(e).context("listing all"))?;

        rows.iter()
            .map(|row| self.policy_from_row(row))
            .collect::<StoreResult<Vec<_>>>()
            .map_err(|e| e.context("listing all"))
    }

    fn policy_from_row(&self, row: &AnyRow) -> StoreResult<Policy> {
        let source_guid: String = row.try_get(0)?;
        let source_slot: i64 = row.try_get(1)?;
        let source_type: String = row.try_get(2)?;
        let destination_guid: String = row.try_get(3)?;
        let destination_slot: i64 = row.try_get(4)?;
        let destination_type: String = row.try_get(5)?;
        let start_ip: String = row.try_get(6)?;
        let end_ip: String = row.try_get(7)?;
        let port: i64 = row.try_get(8)?;
        let start_port: i64 = row.try_get(9)?;
        let end_port: i64 = row.try_get(10)?;
        let protocol: String = row.try_get(11)?;

        // Unmatched outer joins come back as empty strings
        let ips = if start_ip.is_empty() || end_ip.is_empty() {
            Vec::new()
        } else {
            vec![IpRange {
                start: start_ip,
                end: end_ip,
            }]
        };

        Ok(Policy {
            source: Source {
                id: source_guid,
                tag: self.tag_length.format(source_slot),
                group_type: source_type,
            },
            destination: Destination {
                id: destination_guid,
                tag: self.tag_length.format(destination_slot),
                protocol,
                port: port_from_column("port", port)?,
                ports: Ports {
                    start: port_from_column("start_port", start_port)?,
                    end: port_from_column("end_port", end_port)?,
                },
                group_type: destination_type,
                ips,
            },
        })
    }
}

/// Shared startup for the policy and tag stores
pub(crate) async fn initialize(
    pool: &ConnectionPool,
    tag_length: usize,
    migrator: &dyn Migrator,
) -> StoreResult<TagLength> {
    let tag_length = TagLength::new(tag_length)?;

    let applied = migrator
        .perform_migrations(pool.dialect(), pool, 0)
        .await
        .map_err(|e| e.context("perform migrations"))?;
    if applied > 0 {
        info!(applied, dialect = %pool.dialect(), "schema migrated");
    }

    populate_tables(pool, tag_length)
        .await
        .map_err(|e| e.context("populating tables"))?;

    Ok(tag_length)
}

/// Fill an empty groups table with every slot of the tag pool. A non-empty
/// table is left untouched.
async fn populate_tables(pool: &ConnectionPool, tag_length: TagLength) -> StoreResult<()> {
    let count = sqlx::query_scalar::<_, i64>(&pool.prepare(r#"SELECT COUNT(*) FROM "groups""#))
        .fetch_one(pool.inner())
        .await?;
    if count > 0 {
        debug!(count, "tag pool already populated");
        return Ok(());
    }

    let total = tag_length.pool_size();
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    while inserted < total {
        let batch = POPULATE_BATCH.min(total - inserted);
        let values = vec!["(NULL)"; batch as usize].join(", ");
        let sql = tx.prepare(&format!(r#"INSERT INTO "groups" (guid) VALUES {values}"#));
        let result = sqlx::query(&sql).execute(tx.conn()).await;
        if let Err(err) = result {
            return Err(rollback(tx, err.into()).await);
        }
        inserted += batch;
    }
    tx.commit().await?;

    info!(slots = total, tag_length = tag_length.bytes(), "populated tag pool");
    Ok(())
}

pub(crate) async fn rollback(tx: Tx, err: StoreError) -> StoreError {
    match tx.rollback().await {
        Ok(()) => err,
        Err(source) => StoreError::Rollback {
            source,
            cause: Box::new(err),
        },
    }
}

fn skip(policy: &Policy, missing: &'static str) -> StoreResult<()> {
    debug!(
        source = %policy.source.id,
        destination = %policy.destination.id,
        missing,
        "policy already absent, skipping delete"
    );
    Ok(())
}

fn destination_key(group: SlotId, destination: &Destination) -> DestinationKey<'_> {
    let range = destination.port_range();
    DestinationKey {
        group,
        port: destination.legacy_port(),
        start_port: range.start,
        end_port: range.end,
        protocol: &destination.protocol,
    }
}

fn question_marks(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn port_from_column(column: &'static str, value: i64) -> StoreResult<u16> {
    u16::try_from(value).map_err(|_| StoreError::Decode { column, value })
}
