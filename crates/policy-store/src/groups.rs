//! Group allocator - the bounded tag pool
//!
//! The pool is a pre-populated `groups` table. A slot is claimed by writing
//! a guid into an unclaimed row and released by clearing it again, always
//! inside the caller's transaction.

use crate::db::Tx;
use crate::error::{StoreError, StoreResult};
use crate::models::SlotId;
use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

/// Slot allocation over the groups table
#[async_trait]
pub trait GroupRepo: Send + Sync {
    /// Claim a slot for `guid`, or return the one it already holds
    async fn claim(&self, tx: &mut Tx, guid: &str, group_type: &str) -> StoreResult<SlotId>;

    /// Slot currently held by `guid`
    async fn lookup(&self, tx: &mut Tx, guid: &str) -> StoreResult<SlotId>;

    /// Return a slot to the pool
    async fn release(&self, tx: &mut Tx, slot: SlotId) -> StoreResult<()>;
}

/// SQL-backed group allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupTable;

impl GroupTable {
    /// Create allocator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GroupRepo for GroupTable {
    async fn claim(&self, tx: &mut Tx, guid: &str, group_type: &str) -> StoreResult<SlotId> {
        match self.lookup(tx, guid).await {
            Ok(slot) => return Ok(slot),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let sql = tx.prepare(tx.sql().claim_slot());
        let result = sqlx::query(&sql)
            .bind(guid)
            .bind(group_type)
            .execute(tx.conn())
            .await?;

        if result.rows_affected() == 0 {
            let free = sqlx::query_scalar::<_, i64>(
                &tx.prepare(r#"SELECT COUNT(*) FROM "groups" WHERE guid IS NULL"#),
            )
            .fetch_one(tx.conn())
            .await?;
            return Err(empty_claim(free));
        }

        let slot = match self.lookup(tx, guid).await {
            Ok(slot) => slot,
            Err(StoreError::NotFound) => return Err(StoreError::AllocationExhausted),
            Err(e) => return Err(e),
        };
        debug!(guid, group_type, slot, "claimed tag slot");
        Ok(slot)
    }

    async fn lookup(&self, tx: &mut Tx, guid: &str) -> StoreResult<SlotId> {
        let sql = tx.prepare(r#"SELECT id FROM "groups" WHERE guid = ?"#);
        let row = sqlx::query(&sql)
            .bind(guid)
            .fetch_optional(tx.conn())
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Err(StoreError::NotFound),
        }
    }

    async fn release(&self, tx: &mut Tx, slot: SlotId) -> StoreResult<()> {
        let sql = tx.prepare(r#"UPDATE "groups" SET guid = NULL, type = NULL WHERE id = ?"#);
        sqlx::query(&sql).bind(slot).execute(tx.conn()).await?;
        debug!(slot, "released tag slot");
        Ok(())
    }
}

/// Error for a claim that updated no row. Rows skipped because another
/// transaction holds their lock still read as free here.
fn empty_claim(free: i64) -> StoreError {
    if free > 0 {
        StoreError::SlotContended
    } else {
        StoreError::AllocationExhausted
    }
}
