//! IP ranges owned by destination groups

use crate::db::Tx;
use crate::error::StoreResult;
use crate::models::SlotId;
use async_trait::async_trait;

/// IP range persistence, one row per destination group
#[async_trait]
pub trait IpRangeRepo: Send + Sync {
    /// Record the range for a group; a group that already has one is left alone
    async fn create(&self, tx: &mut Tx, group: SlotId, start_ip: &str, end_ip: &str) -> StoreResult<()>;

    /// Drop the range owned by a group
    async fn delete_by_group(&self, tx: &mut Tx, group: SlotId) -> StoreResult<()>;
}

/// SQL-backed IP range repository
#[derive(Debug, Default, Clone, Copy)]
pub struct IpRangeTable;

#[async_trait]
impl IpRangeRepo for IpRangeTable {
    async fn create(&self, tx: &mut Tx, group: SlotId, start_ip: &str, end_ip: &str) -> StoreResult<()> {
        let sql = tx.prepare(&tx.sql().insert_ignore("ip_ranges", &["group_id", "start_ip", "end_ip"]));
        sqlx::query(&sql)
            .bind(group)
            .bind(start_ip)
            .bind(end_ip)
            .execute(tx.conn())
            .await?;
        Ok(())
    }

    async fn delete_by_group(&self, tx: &mut Tx, group: SlotId) -> StoreResult<()> {
        let sql = tx.prepare("DELETE FROM ip_ranges WHERE group_id = ?");
        sqlx::query(&sql).bind(group).execute(tx.conn()).await?;
        Ok(())
    }
}
