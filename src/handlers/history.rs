// handlers/history.rs - /api/history
//
// Proposal status history, client interactions and audit log queries.

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::audit::EntityType;
use crate::database::json_rows_sql;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::validation::{ValidJson, ValidPath, ValidQuery, Validate};

const AUDIT_SELECT: &str = "\
    SELECT al.*, u.full_name AS user_name \
    FROM audit_logs al \
    LEFT JOIN users u ON al.user_id = u.id";

/// GET /api/history/proposal/:proposal_id - oldest first
pub async fn proposal_history(
    State(state): State<AppState>,
    ValidPath(proposal_id): ValidPath<i32>,
) -> ApiResult<Value> {
    let sql = json_rows_sql(
        "SELECT psh.*, u.full_name AS changed_by_name \
         FROM proposal_status_history psh \
         LEFT JOIN users u ON psh.changed_by = u.id \
         WHERE psh.proposal_id = $1 \
         ORDER BY psh.created_at ASC",
    );
    let rows: Value = sqlx::query_scalar(&sql)
        .bind(proposal_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/history/interactions/:client_id - newest first
pub async fn interactions(
    State(state): State<AppState>,
    ValidPath(client_id): ValidPath<i32>,
) -> ApiResult<Value> {
    let sql = json_rows_sql(
        "SELECT ci.*, u.full_name AS user_name \
         FROM client_interactions ci \
         LEFT JOIN users u ON ci.user_id = u.id \
         WHERE ci.client_id = $1 \
         ORDER BY ci.created_at DESC",
    );
    let rows: Value = sqlx::query_scalar(&sql)
        .bind(client_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(ApiResponse::success(rows))
}

#[derive(Debug, Deserialize)]
pub struct InteractionInput {
    pub client_id: Option<i32>,
    pub interaction_type: Option<String>,
    pub description: Option<String>,
}

impl Validate for InteractionInput {
    fn validate(&self) -> Result<(), ApiError> {
        let present = |s: &Option<String>| s.as_deref().map_or(false, |s| !s.trim().is_empty());
        if self.client_id.is_none() || !present(&self.interaction_type) || !present(&self.description) {
            return Err(ApiError::bad_request("Incomplete data"));
        }
        Ok(())
    }
}

/// POST /api/history/interactions
pub async fn create_interaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(body): ValidJson<InteractionInput>,
) -> ApiResult<Value> {
    let interaction: Value = sqlx::query_scalar(
        "INSERT INTO client_interactions (client_id, user_id, interaction_type, description) \
         VALUES ($1, $2, $3, $4) \
         RETURNING row_to_json(client_interactions)",
    )
    .bind(body.client_id)
    .bind(user.id)
    .bind(&body.interaction_type)
    .bind(&body.description)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::created(interaction))
}

/// GET /api/history/audit/:entity_type/:entity_id - latest 100 entries
pub async fn audit_for_entity(
    State(state): State<AppState>,
    ValidPath((entity_type, entity_id)): ValidPath<(String, i32)>,
) -> ApiResult<Value> {
    let entity: EntityType = entity_type
        .parse()
        .map_err(|_| ApiError::invalid_field("entity_type", "Unknown entity type"))?;

    let sql = json_rows_sql(&format!(
        "{} WHERE al.entity_type = $1 AND al.entity_id = $2 ORDER BY al.created_at DESC LIMIT 100",
        AUDIT_SELECT
    ));
    let rows: Value = sqlx::query_scalar(&sql)
        .bind(entity.as_str())
        .bind(entity_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(ApiResponse::success(rows))
}

/// Raw paging parameters. Unparseable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AuditPageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub limit: i64,
}

impl Paging {
    pub const DEFAULT_LIMIT: i64 = 50;

    pub fn from_query(query: &AuditPageQuery, max_limit: i64) -> Self {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        let page = parse(&query.page).filter(|p| *p > 0).unwrap_or(1);
        let limit = parse(&query.limit)
            .filter(|l| *l > 0)
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(max_limit);
        Self { page, limit }
    }

    /// Saturates instead of overflowing; a page past the end is just empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// GET /api/history/audit?page&limit
pub async fn audit_page(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AuditPageQuery>,
) -> ApiResult<Value> {
    let paging = Paging::from_query(&query, state.config.api.max_page_size);

    let sql = json_rows_sql(&format!(
        "{} ORDER BY al.created_at DESC LIMIT $1 OFFSET $2",
        AUDIT_SELECT
    ));
    let rows: Value = sqlx::query_scalar(&sql)
        .bind(paging.limit)
        .bind(paging.offset())
        .fetch_one(&state.pool)
        .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(json!({
        "data": rows,
        "pagination": {
            "page": paging.page,
            "limit": paging.limit,
            "total": total,
            "totalPages": paging.total_pages(total),
        }
    })))
}
