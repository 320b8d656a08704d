//! Append-only audit trail of mutations.
//!
//! The recorder never fails its caller: read and write errors are logged and
//! swallowed at the point where they occur.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryAuditStore;
pub use postgres::PgAuditStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Login => "LOGIN",
        }
    }

    /// Actions that replace or remove an existing row and therefore have a prior state
    pub fn captures_prior_state(&self) -> bool {
        matches!(self, AuditAction::Update | AuditAction::Delete)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audited entity kinds. Each maps to a fixed table, never to caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Client,
    Proposal,
    User,
    Interaction,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Client => "CLIENT",
            EntityType::Proposal => "PROPOSAL",
            EntityType::User => "USER",
            EntityType::Interaction => "INTERACTION",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityType::Client => "clients",
            EntityType::Proposal => "proposals",
            EntityType::User => "users",
            EntityType::Interaction => "client_interactions",
        }
    }

    /// Columns captured in snapshots. Users never expose the password hash.
    pub fn snapshot_columns(&self) -> &'static str {
        match self {
            EntityType::User => "id, username, full_name, role, active, created_at, updated_at",
            _ => "*",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    /// Case-insensitive, so `/api/history/audit/client/1` works.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(EntityType::Client),
            "PROPOSAL" => Ok(EntityType::Proposal),
            "USER" => Ok(EntityType::User),
            "INTERACTION" => Ok(EntityType::Interaction),
            other => Err(format!("unknown entity type '{}'", other)),
        }
    }
}

/// One audit row, as written to `audit_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<i32>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: i32,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub ip_address: String,
    pub user_agent: String,
}

impl AuditEntry {
    /// New entry with system origin; requests override it with [`AuditEntry::from_origin`].
    pub fn new(action: AuditAction, entity_type: EntityType, entity_id: i32) -> Self {
        Self {
            user_id: None,
            action,
            entity_type,
            entity_id,
            old_data: None,
            new_data: None,
            ip_address: "system".to_string(),
            user_agent: "system".to_string(),
        }
    }

    pub fn by(mut self, user_id: Option<i32>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn from_origin(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_data(mut self, old_data: Option<Value>, new_data: Option<Value>) -> Self {
        self.old_data = old_data;
        self.new_data = new_data;
        self
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for audit rows and prior-state snapshots
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Current state of an entity row as JSON, `None` when it does not exist
    async fn snapshot(&self, entity: EntityType, id: i32) -> Result<Option<Value>, AuditError>;

    /// Append one audit row
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Entry point used by the audit middleware and by handlers logging directly.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    enabled: bool,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Best-effort read of an entity's current row. Failures read as "no snapshot".
    pub async fn capture_prior(&self, entity: EntityType, id: i32) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        match self.store.snapshot(entity, id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to capture prior state of {} {}: {}", entity, id, e);
                None
            }
        }
    }

    /// Persist an entry and wait for the write. Never returns an error.
    pub async fn record(&self, entry: AuditEntry) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.append(&entry).await {
            tracing::error!(
                "Failed to write audit log ({} {} {}): {}",
                entry.action,
                entry.entity_type,
                entry.entity_id,
                e
            );
        }
    }

    /// Persist an entry on a background task, detached from the caller.
    pub fn record_detached(&self, entry: AuditEntry) {
        if !self.enabled {
            return;
        }
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(entry).await });
    }
}
