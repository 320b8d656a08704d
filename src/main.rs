use std::net::SocketAddr;
use std::sync::Arc;

use cred_management_api::{
    app::{build_router, AppState},
    audit::PgAuditStore,
    config::AppConfig,
    database::DatabaseManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cred_management_api=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting Cred Management+ API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database)?;
    let port = config.api.port;
    let state = AppState::new(config, pool.clone(), Arc::new(PgAuditStore::new(pool)))?;

    let app = build_router(state);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Cred Management+ API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
