use clap::Args;
use serde_json::json;

use crate::auth::{JwtKeys, Role};
use crate::cli::{
    output::{output_error, output_success},
    OutputFormat,
};
use crate::config::AppConfig;

#[derive(Debug, Args)]
pub struct IssueTokenArgs {
    #[arg(long, help = "Identity id")]
    pub id: i32,

    #[arg(long, help = "Username")]
    pub username: String,

    #[arg(long, default_value = "user", help = "Role: admin or user")]
    pub role: String,
}

pub fn issue(args: IssueTokenArgs, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let role: Role = args.role.parse().map_err(anyhow::Error::msg)?;
    let keys = JwtKeys::from_config(&config.security)?;
    let token = keys.issue(args.id, &args.username, role)?;

    output_success(
        output_format,
        "Token issued",
        Some(json!({ "token": token, "expires_in": keys.expires_in_secs() })),
    )
}

/// Accepts a raw token or a full `Bearer <token>` header value.
pub fn verify(token: &str, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let keys = JwtKeys::from_config(&config.security)?;
    let token = token.split_once(' ').map_or(token, |(_, value)| value).trim();

    match keys.verify(token) {
        Ok(claims) => output_success(output_format, "Token is valid", Some(serde_json::to_value(claims)?)),
        Err(e) => {
            output_error(output_format, "Invalid token")?;
            Err(e.into())
        }
    }
}
