//! Destination repository

use crate::db::Tx;
use crate::error::{StoreError, StoreResult};
use crate::ip_ranges::{IpRangeRepo, IpRangeTable};
use crate::models::{DestinationId, IpRange, SlotId};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Identifying tuple of a destination row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationKey<'a> {
    /// Owning group
    pub group: SlotId,
    /// Legacy single port column
    pub port: u16,
    /// First port
    pub start_port: u16,
    /// Last port
    pub end_port: u16,
    /// Transport protocol
    pub protocol: &'a str,
}

/// Destination persistence
#[async_trait]
pub trait DestinationRepo: Send + Sync {
    /// Find the destination for `key`, creating it when absent
    ///
    /// Only the first entry of `ip_ranges` is persisted.
    async fn find_or_create(
        &self,
        tx: &mut Tx,
        key: DestinationKey<'_>,
        ip_ranges: &[IpRange],
    ) -> StoreResult<DestinationId>;

    /// Destination matching `key`
    async fn lookup(&self, tx: &mut Tx, key: DestinationKey<'_>) -> StoreResult<DestinationId>;

    /// Delete a destination row
    async fn delete(&self, tx: &mut Tx, id: DestinationId) -> StoreResult<()>;

    /// Number of destinations owned by a group
    async fn count_referencing(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64>;
}

/// SQL-backed destination repository
#[derive(Clone)]
pub struct DestinationTable {
    ip_ranges: Arc<dyn IpRangeRepo>,
}

impl DestinationTable {
    /// Create with the IP range repository used for IP destinations
    pub fn new(ip_ranges: Arc<dyn IpRangeRepo>) -> Self {
        Self { ip_ranges }
    }
}

impl Default for DestinationTable {
    fn default() -> Self {
        Self::new(Arc::new(IpRangeTable))
    }
}

#[async_trait]
impl DestinationRepo for DestinationTable {
    async fn find_or_create(
        &self,
        tx: &mut Tx,
        key: DestinationKey<'_>,
        ip_ranges: &[IpRange],
    ) -> StoreResult<DestinationId> {
        let sql = tx.prepare(&tx.sql().insert_ignore(
            "destinations",
            &["group_id", "port", "start_port", "end_port", "protocol"],
        ));
        sqlx::query(&sql)
            .bind(key.group)
            .bind(i64::from(key.port))
            .bind(i64::from(key.start_port))
            .bind(i64::from(key.end_port))
            .bind(key.protocol)
            .execute(tx.conn())
            .await?;

        if let Some(range) = ip_ranges.first() {
            self.ip_ranges
                .create(tx, key.group, &range.start, &range.end)
                .await?;
        }

        self.lookup(tx, key).await
    }

    async fn lookup(&self, tx: &mut Tx, key: DestinationKey<'_>) -> StoreResult<DestinationId> {
        let sql = tx.prepare(
            "SELECT id FROM destinations
             WHERE group_id = ? AND start_port = ? AND end_port = ? AND protocol = ?",
        );
        let row = sqlx::query(&sql)
            .bind(key.group)
            .bind(i64::from(key.start_port))
            .bind(i64::from(key.end_port))
            .bind(key.protocol)
            .fetch_optional(tx.conn())
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, tx: &mut Tx, id: DestinationId) -> StoreResult<()> {
        let sql = tx.prepare("DELETE FROM destinations WHERE id = ?");
        sqlx::query(&sql).bind(id).execute(tx.conn()).await?;
        Ok(())
    }

    async fn count_referencing(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64> {
        let sql = tx.prepare("SELECT COUNT(*) FROM destinations WHERE group_id = ?");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(group)
            .fetch_one(tx.conn())
            .await?;
        Ok(count)
    }
}
