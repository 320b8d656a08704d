mod common;

use axum::{
    extract::Path,
    handler::Handler,
    http::{Method, StatusCode},
    routing::post,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use common::{json_request, send, wait_for_entries};
use cred_management_api::{
    audit::{AuditAction, AuditRecorder, EntityType, MemoryAuditStore},
    auth::Role,
    error::ApiError,
    middleware::{ApiResponse, ApiResult, AuditLayer, AuthUser},
};

async fn create_client(Json(mut body): Json<Value>) -> ApiResult<Value> {
    body["id"] = json!(7);
    Ok(ApiResponse::created(body))
}

async fn update_client(Path(id): Path<i32>, Json(body): Json<Value>) -> ApiResult<Value> {
    if id == 404 {
        return Err(ApiError::not_found("Client not found"));
    }
    Ok(ApiResponse::success(body))
}

async fn delete_client(Path(_id): Path<i32>) -> ApiResult<Value> {
    Ok(ApiResponse::message("Client deleted successfully"))
}

fn audited_app(store: Arc<MemoryAuditStore>) -> Router {
    let recorder = AuditRecorder::new(store, true);
    let layer = |action| AuditLayer::new(recorder.clone(), action, EntityType::Client);

    Router::new()
        .route("/clients", post(create_client.layer(layer(AuditAction::Create))))
        .route(
            "/clients/:id",
            axum::routing::put(update_client.layer(layer(AuditAction::Update)))
                .delete(delete_client.layer(layer(AuditAction::Delete))),
        )
        .layer(Extension(AuthUser {
            id: 42,
            username: "operator".to_string(),
            role: Role::User,
        }))
}

#[tokio::test]
async fn create_records_the_response_body() {
    let store = Arc::new(MemoryAuditStore::new());
    let app = audited_app(store.clone());

    let mut request = json_request(Method::POST, "/clients", &json!({ "full_name": "Ana" }));
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
    request.headers_mut().insert("user-agent", "Mozilla/5.0".parse().unwrap());

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let entries = wait_for_entries(&store, 1).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::Create);
    assert_eq!(entry.entity_type, EntityType::Client);
    assert_eq!(entry.entity_id, 7);
    assert_eq!(entry.user_id, Some(42));
    assert!(entry.old_data.is_none());
    assert_eq!(entry.new_data.as_ref(), Some(&body));
    assert_eq!(entry.ip_address, "203.0.113.9");
    assert_eq!(entry.user_agent, "Mozilla/5.0");
}

#[tokio::test]
async fn update_captures_prior_state() {
    let store = Arc::new(MemoryAuditStore::new());
    store.put_snapshot(EntityType::Client, 3, json!({ "id": 3, "full_name": "Old Name" }));
    let app = audited_app(store.clone());

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/clients/3", &json!({ "full_name": "New Name" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = wait_for_entries(&store, 1).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::Update);
    assert_eq!(entry.entity_id, 3);
    assert_eq!(entry.old_data, Some(json!({ "id": 3, "full_name": "Old Name" })));
    assert_eq!(entry.new_data, Some(json!({ "full_name": "New Name" })));
    assert_eq!(entry.ip_address, "unknown");
    assert_eq!(entry.user_agent, "unknown");
}

#[tokio::test]
async fn delete_has_no_new_state() {
    let store = Arc::new(MemoryAuditStore::new());
    store.put_snapshot(EntityType::Client, 5, json!({ "id": 5 }));
    let app = audited_app(store.clone());

    let request = axum::http::Request::builder()
        .method(Method::DELETE)
        .uri("/clients/5")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Client deleted successfully");

    let entries = wait_for_entries(&store, 1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Delete);
    assert_eq!(entries[0].entity_id, 5);
    assert_eq!(entries[0].old_data, Some(json!({ "id": 5 })));
    assert!(entries[0].new_data.is_none());
}

#[tokio::test]
async fn failed_requests_are_not_recorded() {
    let store = Arc::new(MemoryAuditStore::new());
    let app = audited_app(store.clone());

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/clients/404", &json!({ "full_name": "Nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.entries().is_empty());
}

#[tokio::test]
async fn broken_store_does_not_affect_the_response() {
    let store = Arc::new(MemoryAuditStore::failing());
    let app = audited_app(store.clone());

    let (status, body) = send(&app, json_request(Method::POST, "/clients", &json!({ "full_name": "Ana" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["full_name"], "Ana");

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/clients/3", &json!({ "full_name": "Bia" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn disabled_recorder_passes_requests_through() {
    let store = Arc::new(MemoryAuditStore::new());
    let recorder = AuditRecorder::new(store.clone(), false);
    let app = Router::new().route(
        "/clients",
        post(create_client.layer(AuditLayer::new(recorder, AuditAction::Create, EntityType::Client))),
    );

    let (status, _) = send(&app, json_request(Method::POST, "/clients", &json!({ "full_name": "Ana" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.entries().is_empty());
}
