// handlers/mod.rs - Route handlers
//
// Public: service info, health, login and token validation.
// Protected (bearer token): users (admin), clients, proposals, history.

pub mod auth;
pub mod clients;
pub mod history;
pub mod proposals;
pub mod users;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::DatabaseManager;
use crate::error::ApiError;

/// GET / - service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Cred Management+ API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health (public)",
            "auth": "/api/auth/login, /api/auth/validate (public)",
            "users": "/api/users[/:id] (admin)",
            "clients": "/api/clients[/:id], /api/clients/cpf/:cpf (protected)",
            "proposals": "/api/proposals[/:id], /api/proposals/client/:client_id, /api/proposals/stats/overview (protected)",
            "history": "/api/history/proposal/:id, /api/history/interactions[/:client_id], /api/history/audit[/:entity_type/:entity_id] (protected)",
        }
    }))
}

/// GET /api/health - liveness plus a database ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "message": "Cred Management+ API is running",
                "database": "ok",
                "timestamp": now,
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "error": "Database unavailable",
                    "database": "unreachable",
                    "timestamp": now,
                })),
            )
        }
    }
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
