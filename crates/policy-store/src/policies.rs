//! Policy repository - (source group, destination) join rows

use crate::db::Tx;
use crate::error::{StoreError, StoreResult};
use crate::models::{DestinationId, SlotId};
use async_trait::async_trait;

/// Policy join-row persistence
#[async_trait]
pub trait PolicyRepo: Send + Sync {
    /// Insert the join row; an identical row is left untouched
    async fn create(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()>;

    /// Delete the join row, `NotFound` when absent
    async fn delete(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()>;

    /// Policies pointing at a destination
    async fn count_by_destination(&self, tx: &mut Tx, destination: DestinationId) -> StoreResult<i64>;

    /// Policies where the group is the source or owns the destination
    async fn count_by_group(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64>;
}

/// SQL-backed policy repository
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyTable;

#[async_trait]
impl PolicyRepo for PolicyTable {
    async fn create(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()> {
        let sql = tx.prepare(&tx.sql().insert_ignore("policies", &["group_id", "destination_id"]));
        sqlx::query(&sql)
            .bind(source)
            .bind(destination)
            .execute(tx.conn())
            .await?;
        Ok(())
    }

    async fn delete(&self, tx: &mut Tx, source: SlotId, destination: DestinationId) -> StoreResult<()> {
        let sql = tx.prepare("DELETE FROM policies WHERE group_id = ? AND destination_id = ?");
        let result = sqlx::query(&sql)
            .bind(source)
            .bind(destination)
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_by_destination(&self, tx: &mut Tx, destination: DestinationId) -> StoreResult<i64> {
        let sql = tx.prepare("SELECT COUNT(*) FROM policies WHERE destination_id = ?");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(destination)
            .fetch_one(tx.conn())
            .await?;
        Ok(count)
    }

    async fn count_by_group(&self, tx: &mut Tx, group: SlotId) -> StoreResult<i64> {
        let sql = tx.prepare(
            "SELECT COUNT(*) FROM policies
             LEFT OUTER JOIN destinations ON (destinations.id = policies.destination_id)
             WHERE policies.group_id = ? OR destinations.group_id = ?",
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(group)
            .bind(group)
            .fetch_one(tx.conn())
            .await?;
        Ok(count)
    }
}
