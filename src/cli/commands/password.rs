use serde_json::json;

use crate::auth::hash_password;
use crate::cli::{output::output_success, OutputFormat};
use crate::config::AppConfig;

pub async fn handle(password: String, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let cost = config.security.bcrypt_cost;
    let hashed = hash_password(password, cost).await?;
    output_success(output_format, "Password hashed", Some(json!({ "hash": hashed, "cost": cost })))
}
