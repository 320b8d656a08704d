use axum::{
    extract::{RawPathParams, Request},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use url::form_urlencoded;

use super::sanitize::SanitizedBody;
use crate::error::ApiError;
use crate::security::{contains_sql_injection, find_injection};

/// Injection detector for the JSON body and the query string.
///
/// Runs after the sanitizer, before routing.
pub async fn detect_sql_injection(request: Request, next: Next) -> Result<Response, ApiError> {
    if let Some(SanitizedBody(body)) = request.extensions().get::<SanitizedBody>() {
        if let Some(field) = body_injection_field(body) {
            return Err(blocked(&request, field));
        }
    }

    if let Some(query) = request.uri().query() {
        if let Some(field) = query_injection_field(query) {
            return Err(blocked(&request, field));
        }
    }

    Ok(next.run(request).await)
}

/// Injection detector for matched route parameters. Installed per route.
pub async fn reject_injected_params(
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let hit = params
        .iter()
        .find(|(_, value)| contains_sql_injection(value))
        .map(|(name, _)| format!("params.{}", name));

    if let Some(field) = hit {
        return Err(blocked(&request, field));
    }
    Ok(next.run(request).await)
}

fn blocked(request: &Request, field: String) -> ApiError {
    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        field = %field,
        "Possible SQL injection blocked"
    );
    ApiError::invalid_input("Invalid input detected", field)
}

/// Field path of the first injection signature in a body, if any
pub fn body_injection_field(body: &Value) -> Option<String> {
    let prefix = if body.is_string() { "body" } else { "" };
    find_injection(body, prefix)
}

/// Field of the first injected query value. Every pair is checked, so a
/// repeated key cannot hide an earlier value behind a later clean one.
pub fn query_injection_field(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(_, value)| contains_sql_injection(value))
        .map(|(key, _)| format!("query.{}", key))
}
