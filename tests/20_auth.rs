mod common;

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use chrono::Utc;
use serde_json::json;

use common::{bearer, json_request, send, test_app, token_for};
use cred_management_api::auth::{Claims, Role};

fn with_auth(method: Method, uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let (app, _) = test_app();
    let (status, body) = send(&app, common::get("/api/clients")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token not provided");
}

#[tokio::test]
async fn malformed_header_is_rejected() {
    let (app, _) = test_app();
    for value in ["Bearer", "Bearer ", "garbage"] {
        let (status, body) = send(&app, with_auth(Method::GET, "/api/clients", value)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", value);
        assert_eq!(body["error"], "Malformed token", "header {:?}", value);
    }
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let (app, state) = test_app();
    let mut token = token_for(&state, 1, Role::Admin);
    token.push('x');

    let (status, body) = send(&app, with_auth(Method::GET, "/api/clients", &bearer(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let (app, _) = test_app();
    let other = cred_management_api::auth::JwtKeys::new("some-other-secret", 8).unwrap();
    let token = other.issue(1, "admin", Role::Admin).unwrap();

    let (status, body) = send(&app, with_auth(Method::GET, "/api/clients", &bearer(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn expired_token_reads_like_a_bad_signature() {
    let (app, state) = test_app();
    let now = Utc::now().timestamp();
    let claims = Claims {
        id: 1,
        username: "admin".to_string(),
        role: Role::Admin,
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = state.keys.sign(&claims).unwrap();

    let (status, body) = send(&app, with_auth(Method::GET, "/api/clients", &bearer(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn any_scheme_is_accepted() {
    // Passes the verifier, then the role gate denies it, proving the token was read
    let (app, state) = test_app();
    let token = token_for(&state, 2, Role::User);

    let (status, body) = send(&app, with_auth(Method::GET, "/api/users", &format!("Token {}", token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient permissions");
}

#[tokio::test]
async fn user_role_cannot_reach_user_management() {
    let (app, state) = test_app();
    let token = bearer(&token_for(&state, 2, Role::User));

    let (status, _) = send(&app, with_auth(Method::GET, "/api/users", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, with_auth(Method::DELETE, "/api/users/5", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_role_cannot_delete_clients_or_proposals() {
    let (app, state) = test_app();
    let token = bearer(&token_for(&state, 2, Role::User));

    for uri in ["/api/clients/1", "/api/proposals/1"] {
        let (status, body) = send(&app, with_auth(Method::DELETE, uri, &token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "Insufficient permissions");
    }
}

#[tokio::test]
async fn login_requires_both_fields() {
    let (app, _) = test_app();

    let (status, body) = send(&app, json_request(Method::POST, "/api/auth/login", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username is required");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/auth/login", &json!({ "username": "ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password is required");
}

#[tokio::test]
async fn validate_without_token_is_unauthorized() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/validate")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token not provided");
}

/// Every protected route and method, with a body where the handler takes one
const PROTECTED: &[(&str, &str)] = &[
    ("GET", "/api/users"),
    ("POST", "/api/users"),
    ("GET", "/api/users/1"),
    ("PUT", "/api/users/1"),
    ("DELETE", "/api/users/1"),
    ("GET", "/api/clients"),
    ("POST", "/api/clients"),
    ("GET", "/api/clients/1"),
    ("PUT", "/api/clients/1"),
    ("DELETE", "/api/clients/1"),
    ("GET", "/api/clients/cpf/11144477735"),
    ("GET", "/api/proposals"),
    ("POST", "/api/proposals"),
    ("GET", "/api/proposals/stats/overview"),
    ("GET", "/api/proposals/client/1"),
    ("GET", "/api/proposals/1"),
    ("PUT", "/api/proposals/1"),
    ("DELETE", "/api/proposals/1"),
    ("GET", "/api/history/proposal/1"),
    ("GET", "/api/history/interactions/1"),
    ("POST", "/api/history/interactions"),
    ("GET", "/api/history/audit"),
    ("GET", "/api/history/audit/client/1"),
];

fn protected_request(method: &str, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let method: Method = method.parse().unwrap();
    let mut builder = Request::builder().method(method.clone()).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    if method == Method::POST || method == Method::PUT {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "full_name": "Ana" }).to_string()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    }
}

#[tokio::test]
async fn every_protected_route_needs_a_token() {
    let (app, _) = test_app();

    for (method, uri) in PROTECTED {
        let (status, body) = send(&app, protected_request(method, uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["error"], "Token not provided", "{} {}", method, uri);
    }
}

#[tokio::test]
async fn every_protected_route_rejects_a_tampered_token() {
    let (app, state) = test_app();
    let mut token = token_for(&state, 1, Role::Admin);
    token.push('x');
    let header_value = bearer(&token);

    for (method, uri) in PROTECTED {
        let (status, body) = send(&app, protected_request(method, uri, Some(&header_value))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["error"], "Invalid token", "{} {}", method, uri);
    }
}

#[tokio::test]
async fn bad_audit_paging_query_is_a_json_error() {
    let (app, state) = test_app();
    let token = bearer(&token_for(&state, 2, Role::User));

    let request = with_auth(Method::GET, "/api/history/audit?page=1&page=2", &token);
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("page"));
}
