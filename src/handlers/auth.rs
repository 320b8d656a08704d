// handlers/auth.rs - POST /api/auth/login, POST /api/auth/validate

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::app::AppState;
use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::auth::verify_password;
use crate::database::models::{UserCredentials, UserProfile};
use crate::error::ApiError;
use crate::middleware::auth::extract_token;
use crate::middleware::{client_ip, user_agent, ApiResponse, ApiResult};
use crate::validation::{ValidJson, Validate};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.username.is_empty() {
            return Err(ApiError::invalid_field("username", "Username is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::invalid_field("password", "Password is required"));
        }
        Ok(())
    }
}

/// POST /api/auth/login - exchange credentials for a session token
///
/// Unknown user and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Value> {
    let user = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password, full_name, role, COALESCE(active, true) AS active \
         FROM users WHERE username = $1",
    )
    .bind(&body.username)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !user.active {
        return Err(ApiError::unauthorized("Inactive user"));
    }

    if !verify_password(body.password, user.password.clone()).await? {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let role = user.role().ok_or_else(|| {
        tracing::error!("User {} has unknown role '{}'", user.id, user.role);
        ApiError::internal_server_error("An error occurred while processing your request")
    })?;

    let token = state.keys.issue(user.id, &user.username, role)?;

    state
        .audit
        .record(
            AuditEntry::new(AuditAction::Login, EntityType::User, user.id)
                .by(Some(user.id))
                .from_origin(client_ip(&headers, connect_info.as_ref()), user_agent(&headers)),
        )
        .await;

    tracing::info!("User {} logged in", user.username);

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": UserProfile::from(user),
    })))
}

/// POST /api/auth/validate - check a token and re-read its identity
pub async fn validate(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    let token = extract_token(&headers)?;
    let claims = state.keys.verify(token)?;

    let user = sqlx::query_as::<_, UserProfile>(
        "SELECT id, username, full_name, role, COALESCE(active, true) AS active \
         FROM users WHERE id = $1",
    )
    .bind(claims.id)
    .fetch_optional(&state.pool)
    .await?
    .filter(|user| user.active)
    .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}
