mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["name"], "Cred Management+ API");
    assert!(body["endpoints"]["health"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_reports_database_outage() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/api/health", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["error"], "Database unavailable");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/api/does-not-exist", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Route not found");
    Ok(())
}

#[tokio::test]
async fn protected_route_needs_a_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/api/clients", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Token not provided");
    Ok(())
}
