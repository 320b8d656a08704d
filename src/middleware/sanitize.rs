//! Input sanitizer stage.
//!
//! Runs before routing, so route parameters are cleaned by rewriting the path
//! segments of the URI itself. The query string is rewritten the same way and
//! JSON bodies are parsed, cleaned and re-serialized.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use url::form_urlencoded;

use crate::app::AppState;
use crate::error::ApiError;
use crate::security::{sanitize_str, sanitize_value};

/// Characters re-encoded when a cleaned path segment is written back
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Cleaned JSON body, kept so later stages need not parse it again
#[derive(Debug, Clone)]
pub struct SanitizedBody(pub Value);

pub async fn sanitize_input(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request = sanitize_request(request, state.config.api.max_request_size_bytes).await?;
    Ok(next.run(request).await)
}

/// Clean path segments, query values and JSON body leaves of a request.
pub async fn sanitize_request(request: Request, body_limit: usize) -> Result<Request, ApiError> {
    let (mut parts, body) = request.into_parts();

    if let Some(uri) = sanitize_uri(&parts.uri)? {
        parts.uri = uri;
    }

    if !is_json(&parts.headers) {
        return Ok(Request::from_parts(parts, body));
    }

    let bytes = to_bytes(body, body_limit)
        .await
        .map_err(|_| ApiError::payload_too_large("Request body too large"))?;

    if bytes.is_empty() {
        return Ok(Request::from_parts(parts, Body::from(bytes)));
    }

    // Unparseable JSON is passed through; the handler's extractor reports it.
    let mut value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return Ok(Request::from_parts(parts, Body::from(bytes))),
    };
    sanitize_value(&mut value);

    let cleaned = serde_json::to_vec(&value).map_err(|e| {
        tracing::error!("Failed to re-serialize sanitized body: {}", e);
        ApiError::internal_server_error("Failed to process request body")
    })?;

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
    parts.extensions.insert(SanitizedBody(value));

    Ok(Request::from_parts(parts, Body::from(cleaned)))
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("application/json") || ct.contains("+json")
        })
        .unwrap_or(false)
}

/// Returns a rewritten URI when any path segment or query value changed.
fn sanitize_uri(uri: &Uri) -> Result<Option<Uri>, ApiError> {
    let path = sanitize_path(uri.path());
    let query = uri.query().map(sanitize_query);

    let path_changed = path.is_some();
    let query_changed = matches!(query, Some(Some(_)));
    if !path_changed && !query_changed {
        return Ok(None);
    }

    let new_path = path.unwrap_or_else(|| uri.path().to_string());
    let new_query = match query {
        Some(Some(cleaned)) => Some(cleaned),
        _ => uri.query().map(str::to_string),
    };
    let path_and_query = match new_query {
        Some(q) if !q.is_empty() => format!("{}?{}", new_path, q),
        _ => new_path,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query.as_str())
            .map_err(|_| ApiError::bad_request("Invalid request path"))?,
    );
    Uri::from_parts(parts)
        .map(Some)
        .map_err(|_| ApiError::bad_request("Invalid request path"))
}

fn sanitize_path(path: &str) -> Option<String> {
    let mut changed = false;
    let segments: Vec<String> = path
        .split('/')
        .map(|raw| {
            let decoded = percent_decode_str(raw).decode_utf8_lossy();
            let cleaned = sanitize_str(&decoded);
            if cleaned == decoded {
                raw.to_string()
            } else {
                changed = true;
                utf8_percent_encode(&cleaned, PATH_SEGMENT).to_string()
            }
        })
        .collect();

    changed.then(|| segments.join("/"))
}

fn sanitize_query(query: &str) -> Option<String> {
    let mut changed = false;
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| {
            let cleaned = sanitize_str(&value);
            if cleaned != value {
                changed = true;
            }
            (key.into_owned(), cleaned)
        })
        .collect();

    if !changed {
        return None;
    }
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish(),
    )
}
