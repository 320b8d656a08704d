use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{AuditEntry, AuditError, AuditStore, EntityType};

/// In-process audit store.
///
/// Used by the router tests and by deployments that run with auditing pointed
/// away from the database. A `failing` store rejects every call, which is how the
/// never-fails-the-caller guarantee gets exercised.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
    snapshots: Mutex<HashMap<(EntityType, i32), Value>>,
    failing: bool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Seed the row a later UPDATE/DELETE will read as its prior state
    pub fn put_snapshot(&self, entity: EntityType, id: i32, row: Value) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert((entity, id), row);
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), AuditError> {
        if self.failing {
            return Err(AuditError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn snapshot(&self, entity: EntityType, id: i32) -> Result<Option<Value>, AuditError> {
        self.check()?;
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|e| AuditError::Unavailable(e.to_string()))?;
        Ok(snapshots.get(&(entity, id)).cloned())
    }

    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.check()?;
        self.entries
            .lock()
            .map_err(|e| AuditError::Unavailable(e.to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use serde_json::json;

    #[tokio::test]
    async fn stores_snapshots_and_entries() {
        let store = MemoryAuditStore::new();
        store.put_snapshot(EntityType::Proposal, 2, json!({ "status": "Pendente" }));

        let snap = store.snapshot(EntityType::Proposal, 2).await.unwrap();
        assert_eq!(snap, Some(json!({ "status": "Pendente" })));
        assert!(store.snapshot(EntityType::Client, 2).await.unwrap().is_none());

        store
            .append(&AuditEntry::new(AuditAction::Create, EntityType::Proposal, 2))
            .await
            .unwrap();
        assert_eq!(store.entries().len(), 1);
    }
}
