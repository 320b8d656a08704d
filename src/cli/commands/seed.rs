use clap::Args;
use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditAction, AuditEntry, AuditRecorder, EntityType, PgAuditStore};
use crate::auth::hash_password;
use crate::cli::{output::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::DatabaseManager;

#[derive(Debug, Args)]
pub struct SeedAdminArgs {
    #[arg(long, default_value = "admin", help = "Username of the administrator")]
    pub username: String,

    #[arg(long, help = "Initial password (at least 6 characters)")]
    pub password: String,

    #[arg(long, default_value = "Administrator", help = "Display name")]
    pub full_name: String,
}

/// Insert the administrator unless the username is already taken.
///
/// The row is audited as a system-originated CREATE USER.
pub async fn handle(
    args: SeedAdminArgs,
    config: &AppConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    if args.password.chars().count() < 6 {
        anyhow::bail!("Password must be at least 6 characters");
    }

    let pool = DatabaseManager::connect(&config.database).await?;

    let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&args.username)
        .fetch_optional(&pool)
        .await?;
    if let Some(id) = existing {
        anyhow::bail!("User '{}' already exists (ID: {})", args.username, id);
    }

    let hashed = hash_password(args.password, config.security.bcrypt_cost).await?;

    let (id, row): (i32, serde_json::Value) = sqlx::query_as(
        "INSERT INTO users (username, password, full_name, role, active) \
         VALUES ($1, $2, $3, 'admin', true) \
         RETURNING id, json_build_object('id', id, 'username', username, \
                   'full_name', full_name, 'role', role, 'active', active)",
    )
    .bind(&args.username)
    .bind(&hashed)
    .bind(&args.full_name)
    .fetch_one(&pool)
    .await?;

    let recorder = AuditRecorder::new(
        Arc::new(PgAuditStore::new(pool.clone())),
        config.security.enable_audit_logging,
    );
    recorder
        .record(AuditEntry::new(AuditAction::Create, EntityType::User, id).with_data(None, Some(row)))
        .await;

    tracing::info!("Seeded administrator {} (id={})", args.username, id);
    output_success(
        output_format,
        "Administrator created",
        Some(json!({ "id": id, "username": args.username })),
    )
}
