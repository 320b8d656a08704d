use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{AuditEntry, AuditError, AuditStore, EntityType};
use crate::database::json_row_sql;

/// `audit_logs` table backed store
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Snapshot query for an entity. Table and columns come from the enum only.
pub(crate) fn snapshot_sql(entity: EntityType) -> String {
    json_row_sql(&format!(
        "SELECT {} FROM {} WHERE id = $1",
        entity.snapshot_columns(),
        entity.table()
    ))
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn snapshot(&self, entity: EntityType, id: i32) -> Result<Option<Value>, AuditError> {
        let row: Option<Value> = sqlx::query_scalar(&snapshot_sql(entity))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO audit_logs \
             (user_id, action, entity_type, entity_id, old_data, new_data, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.old_data)
        .bind(&entry.new_data)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
