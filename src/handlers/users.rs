// handlers/users.rs - /api/users (admin only)
//
// Password hashes are written here but never read back out.

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::app::AppState;
use crate::auth::{hash_password, Role};
use crate::database::models::UserRecord;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::validation::{require_min_len, ValidJson, ValidPath, Validate};

const USER_COLUMNS: &str =
    "id, username, full_name, role, COALESCE(active, true) AS active, created_at, updated_at";

const USERNAME_TOO_SHORT: &str = "Username must have at least 3 characters";
const PASSWORD_TOO_SHORT: &str = "Password must have at least 6 characters";
const FULL_NAME_REQUIRED: &str = "Full name is required";

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

impl Validate for CreateUser {
    fn validate(&self) -> Result<(), ApiError> {
        require_min_len("username", &self.username, 3, USERNAME_TOO_SHORT)?;
        require_min_len("password", &self.password, 6, PASSWORD_TOO_SHORT)?;
        require_min_len("full_name", &self.full_name, 3, FULL_NAME_REQUIRED)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl Validate for UpdateUser {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(username) = &self.username {
            require_min_len("username", username, 3, USERNAME_TOO_SHORT)?;
        }
        if let Some(password) = &self.password {
            require_min_len("password", password, 6, PASSWORD_TOO_SHORT)?;
        }
        if let Some(full_name) = &self.full_name {
            require_min_len("full_name", full_name, 3, FULL_NAME_REQUIRED)?;
        }
        Ok(())
    }
}

/// GET /api/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<UserRecord>> {
    let users = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC",
        USER_COLUMNS
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(users))
}

/// GET /api/users/:id
pub async fn show(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<UserRecord> {
    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(user))
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateUser>,
) -> ApiResult<UserRecord> {
    if username_taken(&state, &body.username, None).await? {
        return Err(ApiError::bad_request("Username already in use"));
    }

    let hashed = hash_password(body.password, state.config.security.bcrypt_cost).await?;

    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "INSERT INTO users (username, password, full_name, role) VALUES ($1, $2, $3, $4) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&body.username)
    .bind(&hashed)
    .bind(&body.full_name)
    .bind(body.role.as_str())
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("User {} created", user.username);
    Ok(ApiResponse::created(user))
}

/// PUT /api/users/:id - partial update, only the supplied fields change
pub async fn update(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
    ValidJson(body): ValidJson<UpdateUser>,
) -> ApiResult<UserRecord> {
    let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    if let Some(username) = &body.username {
        if username_taken(&state, username, Some(id)).await? {
            return Err(ApiError::bad_request("Username already in use"));
        }
    }

    let hashed = match body.password {
        Some(password) => Some(hash_password(password, state.config.security.bcrypt_cost).await?),
        None => None,
    };

    let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET ");
    let mut set = query.separated(", ");
    if let Some(username) = body.username {
        set.push("username = ").push_bind_unseparated(username);
    }
    if let Some(hashed) = hashed {
        set.push("password = ").push_bind_unseparated(hashed);
    }
    if let Some(full_name) = body.full_name {
        set.push("full_name = ").push_bind_unseparated(full_name);
    }
    if let Some(role) = body.role {
        set.push("role = ").push_bind_unseparated(role.as_str());
    }
    if let Some(active) = body.active {
        set.push("active = ").push_bind_unseparated(active);
    }
    set.push("updated_at = CURRENT_TIMESTAMP");

    query.push(" WHERE id = ").push_bind(id);
    query.push(" RETURNING ").push(USER_COLUMNS);

    let user = query
        .build_query_as::<UserRecord>()
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(user))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(current): Extension<AuthUser>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<Value> {
    if current.id == id {
        return Err(ApiError::bad_request("Cannot delete your own user"));
    }

    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("User {} deleted by {}", id, current.username);
    Ok(ApiResponse::message("User deleted successfully"))
}

async fn username_taken(
    state: &AppState,
    username: &str,
    except: Option<i32>,
) -> Result<bool, ApiError> {
    let found: Option<i32> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = $1 AND ($2::int IS NULL OR id <> $2)")
            .bind(username)
            .bind(except)
            .fetch_optional(&state.pool)
            .await?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rules() {
        let body: CreateUser = serde_json::from_value(serde_json::json!({
            "username": "jo", "password": "123456", "full_name": "Joana", "role": "user"
        }))
        .unwrap();
        assert_eq!(body.validate().unwrap_err().message(), USERNAME_TOO_SHORT);

        let body: CreateUser = serde_json::from_value(serde_json::json!({
            "username": "joana", "password": "123", "full_name": "Joana", "role": "user"
        }))
        .unwrap();
        assert_eq!(body.validate().unwrap_err().message(), PASSWORD_TOO_SHORT);
    }

    #[test]
    fn role_must_be_known() {
        let result = serde_json::from_value::<CreateUser>(serde_json::json!({
            "username": "joana", "password": "123456", "full_name": "Joana", "role": "root"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn update_checks_only_present_fields() {
        assert!(UpdateUser::default().validate().is_ok());
        let body = UpdateUser {
            full_name: Some("Al".into()),
            ..UpdateUser::default()
        };
        assert_eq!(body.validate().unwrap_err().message(), FULL_NAME_REQUIRED);
    }
}
