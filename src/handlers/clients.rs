// handlers/clients.rs - /api/clients
//
// Clients are returned with their benefits aggregated into a `benefits` array.
// Create and update write the client row and its benefits in one transaction.

use axum::extract::State;
use axum::Extension;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgConnection;

use crate::app::AppState;
use crate::database::{json_row_sql, json_rows_sql};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::validation::{
    age_on, empty_as_none, is_valid_cpf, is_valid_email, normalize_cpf, require_min_len,
    required_date, AccountType, ValidJson, ValidPath, Validate,
};

const CLIENT_SELECT: &str = "\
    SELECT c.*, \
        COALESCE(json_agg(json_build_object( \
            'id', cb.id, \
            'benefit_organ', cb.benefit_organ, \
            'benefit_number', cb.benefit_number, \
            'benefit_species', cb.benefit_species, \
            'benefit_species_description', cb.benefit_species_description, \
            'bank_code', cb.bank_code, \
            'bank_name', cb.bank_name, \
            'account_type', cb.account_type, \
            'agency', cb.agency, \
            'account_number', cb.account_number, \
            'account_digit', cb.account_digit, \
            'concession_date', cb.concession_date, \
            'gross_salary', cb.gross_salary \
        )) FILTER (WHERE cb.id IS NOT NULL), '[]'::json) AS benefits \
    FROM clients c \
    LEFT JOIN client_benefits cb ON c.id = cb.client_id";

#[derive(Debug, Deserialize)]
pub struct BenefitInput {
    pub benefit_organ: String,
    pub benefit_number: String,
    pub benefit_species: Option<String>,
    pub benefit_species_description: Option<String>,
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub account_type: Option<AccountType>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    pub account_digit: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub concession_date: Option<NaiveDate>,
    pub gross_salary: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ClientInput {
    pub cpf: String,
    pub full_name: String,
    #[serde(deserialize_with = "required_date")]
    pub birth_date: NaiveDate,
    pub rg: Option<String>,
    pub document_type: Option<String>,
    pub rg_issuer: Option<String>,
    pub rg_issuer_state: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub rg_issue_date: Option<NaiveDate>,
    pub mother_name: Option<String>,
    pub father_name: Option<String>,
    pub birthplace_city: Option<String>,
    pub birthplace_state: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub address_number: Option<String>,
    pub address_complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone_1: Option<String>,
    pub phone_2: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub benefits: Vec<BenefitInput>,
}

impl Validate for ClientInput {
    fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_cpf(&self.cpf) {
            return Err(ApiError::invalid_field("cpf", "Invalid CPF"));
        }
        require_min_len("full_name", &self.full_name, 3, "Full name is required")?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            if !is_valid_email(email) {
                return Err(ApiError::invalid_field("email", "Invalid email"));
            }
        }
        for (index, benefit) in self.benefits.iter().enumerate() {
            if benefit.benefit_organ.trim().is_empty() || benefit.benefit_number.trim().is_empty() {
                return Err(ApiError::invalid_field(
                    format!("benefits.{}", index),
                    "Benefit organ and number are required",
                ));
            }
        }
        Ok(())
    }
}

impl ClientInput {
    fn age(&self) -> i32 {
        age_on(self.birth_date, Utc::now().date_naive())
    }

    fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// GET /api/clients
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let sql = json_rows_sql(&format!(
        "{} GROUP BY c.id ORDER BY c.created_at DESC",
        CLIENT_SELECT
    ));
    let rows: Value = sqlx::query_scalar(&sql).fetch_one(&state.pool).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /api/clients/:id
pub async fn show(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<Value> {
    let sql = json_row_sql(&format!("{} WHERE c.id = $1 GROUP BY c.id", CLIENT_SELECT));
    let client: Option<Value> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;

    client
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Client not found"))
}

/// GET /api/clients/cpf/:cpf - formatting in the CPF is ignored
pub async fn by_cpf(
    State(state): State<AppState>,
    ValidPath(cpf): ValidPath<String>,
) -> ApiResult<Value> {
    let sql = json_row_sql(&format!("{} WHERE c.cpf = $1 GROUP BY c.id", CLIENT_SELECT));
    let client: Option<Value> = sqlx::query_scalar(&sql)
        .bind(normalize_cpf(&cpf))
        .fetch_optional(&state.pool)
        .await?;

    client
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Client not found"))
}

/// POST /api/clients
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(body): ValidJson<ClientInput>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await?;

    let (client_id, client): (i32, Value) = sqlx::query_as(
        "INSERT INTO clients ( \
            cpf, full_name, birth_date, age, rg, document_type, rg_issuer, rg_issuer_state, \
            rg_issue_date, mother_name, father_name, birthplace_city, birthplace_state, \
            zip_code, address, address_number, address_complement, neighborhood, \
            city, state, phone_1, phone_2, email, tags, notes, photo_url, created_by \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                   $18, $19, $20, $21, $22, $23, $24, $25, $26, $27) \
         RETURNING id, row_to_json(clients)",
    )
    .bind(normalize_cpf(&body.cpf))
    .bind(&body.full_name)
    .bind(body.birth_date)
    .bind(body.age())
    .bind(&body.rg)
    .bind(&body.document_type)
    .bind(&body.rg_issuer)
    .bind(&body.rg_issuer_state)
    .bind(body.rg_issue_date)
    .bind(&body.mother_name)
    .bind(&body.father_name)
    .bind(&body.birthplace_city)
    .bind(&body.birthplace_state)
    .bind(&body.zip_code)
    .bind(&body.address)
    .bind(&body.address_number)
    .bind(&body.address_complement)
    .bind(&body.neighborhood)
    .bind(&body.city)
    .bind(&body.state)
    .bind(&body.phone_1)
    .bind(&body.phone_2)
    .bind(&body.email)
    .bind(&body.tags)
    .bind(&body.notes)
    .bind(body.photo_url())
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    insert_benefits(&mut tx, client_id, &body.benefits).await?;
    tx.commit().await?;

    tracing::info!("Client {} created by {}", client_id, user.username);
    Ok(ApiResponse::created(client))
}

/// PUT /api/clients/:id - full replacement, benefits included
pub async fn update(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
    ValidJson(body): ValidJson<ClientInput>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await?;

    let client: Option<Value> = sqlx::query_scalar(
        "UPDATE clients SET \
            cpf = $1, full_name = $2, birth_date = $3, age = $4, rg = $5, \
            document_type = $6, rg_issuer = $7, rg_issuer_state = $8, rg_issue_date = $9, \
            mother_name = $10, father_name = $11, birthplace_city = $12, \
            birthplace_state = $13, zip_code = $14, address = $15, \
            address_number = $16, address_complement = $17, neighborhood = $18, \
            city = $19, state = $20, phone_1 = $21, phone_2 = $22, email = $23, \
            tags = $24, notes = $25, photo_url = COALESCE($26, photo_url), \
            updated_at = CURRENT_TIMESTAMP \
         WHERE id = $27 \
         RETURNING row_to_json(clients)",
    )
    .bind(normalize_cpf(&body.cpf))
    .bind(&body.full_name)
    .bind(body.birth_date)
    .bind(body.age())
    .bind(&body.rg)
    .bind(&body.document_type)
    .bind(&body.rg_issuer)
    .bind(&body.rg_issuer_state)
    .bind(body.rg_issue_date)
    .bind(&body.mother_name)
    .bind(&body.father_name)
    .bind(&body.birthplace_city)
    .bind(&body.birthplace_state)
    .bind(&body.zip_code)
    .bind(&body.address)
    .bind(&body.address_number)
    .bind(&body.address_complement)
    .bind(&body.neighborhood)
    .bind(&body.city)
    .bind(&body.state)
    .bind(&body.phone_1)
    .bind(&body.phone_2)
    .bind(&body.email)
    .bind(&body.tags)
    .bind(&body.notes)
    .bind(body.photo_url())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    // Dropping the transaction rolls it back
    let client = client.ok_or_else(|| ApiError::not_found("Client not found"))?;

    sqlx::query("DELETE FROM client_benefits WHERE client_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_benefits(&mut tx, id, &body.benefits).await?;
    tx.commit().await?;

    Ok(ApiResponse::success(client))
}

/// DELETE /api/clients/:id (admin)
pub async fn delete(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i32>,
) -> ApiResult<Value> {
    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM clients WHERE id = $1 RETURNING id")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::not_found("Client not found"));
    }

    Ok(ApiResponse::message("Client deleted successfully"))
}

async fn insert_benefits(
    conn: &mut PgConnection,
    client_id: i32,
    benefits: &[BenefitInput],
) -> Result<(), sqlx::Error> {
    for benefit in benefits {
        sqlx::query(
            "INSERT INTO client_benefits ( \
                client_id, benefit_organ, benefit_number, benefit_species, \
                benefit_species_description, bank_code, bank_name, account_type, \
                agency, account_number, account_digit, concession_date, gross_salary \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(client_id)
        .bind(&benefit.benefit_organ)
        .bind(&benefit.benefit_number)
        .bind(&benefit.benefit_species)
        .bind(&benefit.benefit_species_description)
        .bind(&benefit.bank_code)
        .bind(&benefit.bank_name)
        .bind(benefit.account_type.map(|t| t.as_str()))
        .bind(&benefit.agency)
        .bind(&benefit.account_number)
        .bind(&benefit.account_digit)
        .bind(benefit.concession_date)
        .bind(benefit.gross_salary)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
