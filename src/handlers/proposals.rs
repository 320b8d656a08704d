// handlers/proposals.rs - /api/proposals
//
// Every status a proposal passes through is written to proposal_status_history.

use axum::{extract::State, Extension};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::{json_row_sql, json_rows_sql};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::validation::{required_date, ValidJson, ValidPath, Validate};

const PROPOSAL_SELECT: &str = "\
    SELECT p.*, \
        c.cpf, c.full_name AS client_name, c.birth_date, c.age, c.phone_1, \
        cb.benefit_organ, cb.benefit_number, cb.benefit_species, \
        cb.benefit_species_description, cb.account_type, cb.agency, \
        cb.account_number, cb.account_digit, cb.bank_name, \
        u1.full_name AS digitized_by_name, \
        u2.full_name AS attended_by_name \
    FROM proposals p \
    LEFT JOIN clients c ON p.client_id = c.id \
    LEFT JOIN client_benefits cb ON p.benefit_id = cb.id \
    LEFT JOIN users u1 ON p.digitized_by = u1.id \
    LEFT JOIN users u2 ON p.attended_by = u2.id";

/// Statuses that block a second proposal for the same client
pub const OPEN_STATUSES: [&str; 3] = ["Pendente", "Em Análise", "Aprovado"];

#[derive(Debug, Deserialize)]
pub struct ProposalInput {
    pub client_id: i32,
    pub benefit_id: Option<i32>,
    #[serde(deserialize_with = "required_date")]
    pub proposal_date: NaiveDate,
    pub contract_value: Decimal,
    pub balance_due: Option<Decimal>,
    pub change_amount: Option<Decimal>,
    pub installment_value: Decimal,
    pub installment_count: i32,
    pub contract_bank: String,
    pub bank_login: Option<String>,
    pub contract_type: String,
    pub status: String,
    pub interest_rate: Option<Decimal>,
    pub digitized_by: Option<i32>,
    pub attended_by: Option<i32>,
    pub notes: Option<String>,
}

impl Validate for ProposalInput {
    fn validate(&self) -> Result<(), ApiError> {
        if self.status.trim().is_empty() {
            return Err(ApiError::invalid_field("status", "Status is required"));
        }
        if self.installment_count < 1 {
            return Err(ApiError::invalid_field(
                "installment_count",
                "Installment count must be positive",
            ));
        }
        Ok(())
    }
}

/// GET /api/proposals
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let sql = json_rows_sql(&format!(
        "{} ORDER BY p.proposal_date DESC, p.created_at DESC",
        PROPOSAL_SELECT
    ));
    let rows: Value = sqlx::query_scalar(&sql).fetch_one(&state.pool).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/proposals/:id
pub async fn show(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<Value> {
    let sql = json_row_sql(&format!("{} WHERE p.id = $1", PROPOSAL_SELECT));
    let proposal: Option<Value> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    proposal
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Proposal not found"))
}

/// GET /api/proposals/client/:client_id
pub async fn by_client(
    State(state): State<AppState>,
    ValidPath(client_id): ValidPath<i32>,
) -> ApiResult<Value> {
    let sql = json_rows_sql(&format!(
        "{} WHERE p.client_id = $1 ORDER BY p.proposal_date DESC, p.created_at DESC",
        PROPOSAL_SELECT
    ));
    let rows: Value = sqlx::query_scalar(&sql)
        .bind(client_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/proposals/stats/overview
pub async fn stats(State(state): State<AppState>) -> ApiResult<Value> {
    let sql = json_row_sql(
        "SELECT \
            COUNT(*) AS total_proposals, \
            COUNT(DISTINCT client_id) AS total_clients, \
            SUM(contract_value) AS total_contract_value, \
            AVG(contract_value) AS avg_contract_value, \
            COUNT(CASE WHEN status = 'Aprovado' THEN 1 END) AS approved_count, \
            COUNT(CASE WHEN status = 'Pendente' THEN 1 END) AS pending_count, \
            COUNT(CASE WHEN status = 'Negado' THEN 1 END) AS denied_count, \
            COUNT(CASE WHEN status = 'Em Análise' THEN 1 END) AS analyzing_count \
         FROM proposals",
    );
    let overview: Value = sqlx::query_scalar(&sql).fetch_one(&state.pool).await?;
    Ok(ApiResponse::success(overview))
}

/// POST /api/proposals - 409 when the client already has an open proposal
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(body): ValidJson<ProposalInput>,
) -> ApiResult<Value> {
    let existing: Option<Value> = sqlx::query_scalar(&json_row_sql(
        "SELECT p.id, p.status, p.proposal_date, c.full_name, c.cpf \
         FROM proposals p \
         JOIN clients c ON p.client_id = c.id \
         WHERE p.client_id = $1 AND p.status = ANY($2) \
         ORDER BY p.proposal_date DESC \
         LIMIT 1",
    ))
    .bind(body.client_id)
    .bind(&OPEN_STATUSES[..])
    .fetch_optional(&state.pool)
    .await?;

    if let Some(existing) = existing {
        return Err(duplicate_proposal(existing));
    }

    let mut tx = state.pool.begin().await?;

    let (proposal_id, proposal): (i32, Value) = sqlx::query_as(
        "INSERT INTO proposals ( \
            client_id, benefit_id, proposal_date, contract_value, balance_due, \
            change_amount, installment_value, installment_count, contract_bank, \
            bank_login, contract_type, status, interest_rate, digitized_by, \
            attended_by, notes, created_by \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         RETURNING id, row_to_json(proposals)",
    )
    .bind(body.client_id)
    .bind(body.benefit_id)
    .bind(body.proposal_date)
    .bind(body.contract_value)
    .bind(body.balance_due)
    .bind(body.change_amount)
    .bind(body.installment_value)
    .bind(body.installment_count)
    .bind(&body.contract_bank)
    .bind(&body.bank_login)
    .bind(&body.contract_type)
    .bind(&body.status)
    .bind(body.interest_rate)
    .bind(body.digitized_by)
    .bind(body.attended_by)
    .bind(&body.notes)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO proposal_status_history (proposal_id, old_status, new_status, changed_by, notes) \
         VALUES ($1, NULL, $2, $3, 'Proposal created')",
    )
    .bind(proposal_id)
    .bind(&body.status)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ApiResponse::created(proposal))
}

/// PUT /api/proposals/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidPath(id): ValidPath<i32>,
    ValidJson(body): ValidJson<ProposalInput>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await?;

    let old_status: String = sqlx::query_scalar("SELECT status FROM proposals WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Proposal not found"))?;

    let proposal: Value = sqlx::query_scalar(
        "UPDATE proposals SET \
            client_id = $1, benefit_id = $2, proposal_date = $3, contract_value = $4, \
            balance_due = $5, change_amount = $6, installment_value = $7, \
            installment_count = $8, contract_bank = $9, bank_login = $10, \
            contract_type = $11, status = $12, interest_rate = $13, \
            digitized_by = $14, attended_by = $15, notes = $16, \
            updated_at = CURRENT_TIMESTAMP \
         WHERE id = $17 \
         RETURNING row_to_json(proposals)",
    )
    .bind(body.client_id)
    .bind(body.benefit_id)
    .bind(body.proposal_date)
    .bind(body.contract_value)
    .bind(body.balance_due)
    .bind(body.change_amount)
    .bind(body.installment_value)
    .bind(body.installment_count)
    .bind(&body.contract_bank)
    .bind(&body.bank_login)
    .bind(&body.contract_type)
    .bind(&body.status)
    .bind(body.interest_rate)
    .bind(body.digitized_by)
    .bind(body.attended_by)
    .bind(&body.notes)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if old_status != body.status {
        sqlx::query(
            "INSERT INTO proposal_status_history (proposal_id, old_status, new_status, changed_by, notes) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&old_status)
        .bind(&body.status)
        .bind(user.id)
        .bind(status_change_note(&old_status, &body.status))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(ApiResponse::success(proposal))
}

/// DELETE /api/proposals/:id (admin)
pub async fn delete(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<Value> {
    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM proposals WHERE id = $1 RETURNING id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::not_found("Proposal not found"));
    }

    Ok(ApiResponse::message("Proposal deleted successfully"))
}

fn duplicate_proposal(existing: Value) -> ApiError {
    let message = format!(
        "Client {} (CPF: {}) already has a {} proposal (ID: {})",
        existing["full_name"].as_str().unwrap_or("?"),
        existing["cpf"].as_str().unwrap_or("?"),
        existing["status"].as_str().unwrap_or("?"),
        existing["id"],
    );
    ApiError::conflict(
        "Duplicate proposal detected",
        Some(json!({ "message": message, "existingProposal": existing })),
    )
}

fn status_change_note(old: &str, new: &str) -> String {
    format!("Status changed from \"{}\" to \"{}\"", old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn duplicate_carries_existing_proposal() {
        let err = duplicate_proposal(json!({
            "id": 12, "status": "Pendente", "proposal_date": "2024-03-01",
            "full_name": "Maria da Silva", "cpf": "11144477735"
        }));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let body = err.to_json();
        assert_eq!(body["error"], "Duplicate proposal detected");
        assert_eq!(body["existingProposal"]["id"], 12);
        assert_eq!(
            body["message"],
            "Client Maria da Silva (CPF: 11144477735) already has a Pendente proposal (ID: 12)"
        );
    }

    #[test]
    fn status_note_format() {
        assert_eq!(
            status_change_note("Pendente", "Aprovado"),
            "Status changed from \"Pendente\" to \"Aprovado\""
        );
    }

    #[test]
    fn parses_monetary_fields() {
        let body: ProposalInput = serde_json::from_value(json!({
            "client_id": 3,
            "proposal_date": "2024-03-01",
            "contract_value": 15000.75,
            "installment_value": 410.2,
            "installment_count": 84,
            "contract_bank": "Banco do Brasil",
            "contract_type": "Novo",
            "status": "Pendente"
        }))
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.contract_value, Decimal::new(1500075, 2));
        assert!(body.benefit_id.is_none());
    }
}
