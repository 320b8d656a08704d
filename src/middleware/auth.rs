use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{Claims, Role};
use crate::error::ApiError;

/// Verified identity attached to the request by [`authenticate`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Credential verifier: validates the bearer token and attaches the identity.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())?;
    let claims = state.keys.verify(token)?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Pull the credential out of `Authorization: <scheme> <token>`.
///
/// The scheme itself is not checked, only that both halves are present.
pub fn extract_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Token not provided"))?;

    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Malformed token"))?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if !scheme.is_empty() && !token.is_empty() => Ok(token),
        _ => Err(ApiError::unauthorized("Malformed token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn missing_header() {
        let err = extract_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.message(), "Token not provided");
    }

    #[test]
    fn malformed_headers() {
        for value in ["Bearer", "Bearer ", "abc.def.ghi", " token"] {
            let err = extract_token(&headers(value)).unwrap_err();
            assert_eq!(err.message(), "Malformed token", "value: {:?}", value);
        }
    }

    #[test]
    fn any_scheme_is_accepted() {
        assert_eq!(extract_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(extract_token(&headers("Token xyz")).unwrap(), "xyz");
    }
}
