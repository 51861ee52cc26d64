//! Tag store - direct access to the tag pool

use crate::db::{ConnectionPool, Tx};
use crate::error::{StoreError, StoreResult};
use crate::groups::GroupRepo;
use crate::migrations::Migrator;
use crate::models::{group_type_or_default, SlotId, Tag, TagLength};
use crate::store::{initialize, rollback};
use sqlx::Row;
use std::sync::Arc;
use tracing::{info, warn};

/// Tag creation and listing without policy semantics
#[derive(Clone)]
pub struct TagStore {
    pool: ConnectionPool,
    groups: Arc<dyn GroupRepo>,
    tag_length: TagLength,
}

impl TagStore {
    /// Validate the tag length, migrate the schema and fill the tag pool
    pub async fn new(
        pool: ConnectionPool,
        groups: Arc<dyn GroupRepo>,
        tag_length: usize,
        migrator: &dyn Migrator,
    ) -> StoreResult<Self> {
        let tag_length = initialize(&pool, tag_length, migrator).await?;
        Ok(Self {
            pool,
            groups,
            tag_length,
        })
    }

    /// Claim (or return the existing) tag for a guid. The returned type is
    /// the one stored with the slot, which for an existing claim may differ
    /// from `group_type`.
    pub async fn create_tag(&self, guid: &str, group_type: &str) -> StoreResult<Tag> {
        let group_type = group_type_or_default(group_type);
        let mut tx = self.pool.begin().await?;

        let claimed = match self.groups.claim(&mut tx, guid, group_type).await {
            Ok(slot) => stored_type(&mut tx, slot).await.map(|stored| (slot, stored)),
            Err(err) => Err(err),
        };
        let (slot, stored) = match claimed {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(error = %err, guid, "tag claim failed, rolling back");
                return Err(rollback(tx, err.context("creating tag")).await);
            }
        };

        tx.commit().await?;
        info!(guid, group_type = %stored, slot, "created tag");

        Ok(Tag {
            id: guid.to_string(),
            tag: self.tag_length.format(slot),
            group_type: stored,
        })
    }

    /// Every claimed tag, ordered by slot
    pub async fn tags(&self) -> StoreResult<Vec<Tag>> {
        let sql = self
            .pool
            .prepare(r#"SELECT guid, id, COALESCE(type, '') FROM "groups" WHERE guid IS NOT NULL ORDER BY id"#);
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| StoreError::from(e).context("listing tags"))?;

        rows.iter()
            .map(|row| -> StoreResult<Tag> {
                let guid: String = row.try_get(0)?;
                let slot: i64 = row.try_get(1)?;
                let group_type: String = row.try_get(2)?;
                Ok(Tag {
                    id: guid,
                    tag: self.tag_length.format(slot),
                    group_type,
                })
            })
            .collect::<StoreResult<Vec<_>>>()
            .map_err(|e| e.context("listing tags"))
    }
}

async fn stored_type(tx: &mut Tx, slot: SlotId) -> StoreResult<String> {
    let sql = tx.prepare(r#"SELECT COALESCE(type, '') FROM "groups" WHERE id = ?"#);
    let row = sqlx::query(&sql).bind(slot).fetch_one(tx.conn()).await?;
    Ok(row.try_get(0)?)
}
