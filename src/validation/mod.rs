//! Field validators shared by the domain handlers.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

/// Digits of a CPF with formatting stripped
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Brazilian CPF check: 11 digits, not all identical, two mod-11 check digits.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = normalize_cpf(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weights run from `len + 1` down to 2; a result of 10 or 11 becomes 0.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    let digit = 11 - (sum % 11);
    if digit >= 10 {
        0
    } else {
        digit
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Whole years between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Corrente,
    Poupanca,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Corrente => "corrente",
            AccountType::Poupanca => "poupanca",
        }
    }
}

/// Require at least `min` characters (after trimming) in a field.
pub fn require_min_len(field: &str, value: &str, min: usize, message: &str) -> Result<(), ApiError> {
    if value.trim().chars().count() < min {
        return Err(ApiError::invalid_field(field, message));
    }
    Ok(())
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time part (`1950-05-20T00:00:00Z`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Deserialize an optional date where `""` and `null` both mean absent.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_date(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", text))),
    }
}

/// Required date field, same formats as [`parse_date`].
pub fn required_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(raw.trim()).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
}

/// Request payloads that check their own field rules after deserialization
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// JSON extractor that maps malformed bodies to 400 and runs [`Validate`].
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Path extractor whose rejections are JSON error bodies.
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(ValidPath(value))
    }
}

/// Query extractor whose rejections are JSON error bodies.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(ValidQuery(value))
    }
}
