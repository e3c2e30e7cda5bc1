//! Router tests for the generation endpoints, run against the in-memory
//! store and fake provider/storage collaborators.

#[path = "../../pipeline/tests/common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use storyreel_api::auth::jwt::{generate_access_token, JwtConfig};
use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;
use storyreel_core::media::MediaKind;
use storyreel_core::task::TaskStatus;
use storyreel_core::types::DbId;
use storyreel_db::store::Persistence;
use storyreel_providers::ProviderAdapter;
use tower::ServiceExt;

use common::*;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "router-test-secret".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

fn app(h: &Harness) -> Router {
    let config = test_config();
    let state = AppState {
        store: Arc::clone(&h.store) as Arc<dyn Persistence>,
        orchestrator: Arc::clone(&h.orchestrator),
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config).unwrap()
}

fn token(owner_id: DbId) -> String {
    generate_access_token(owner_id, &test_config().jwt).unwrap()
}

fn video_harness() -> Harness {
    let mut state = base_state("fake");
    state.shots = (1..=3).map(|id| shot(id, id, id as i32, 4.0)).collect();
    let adapter: Arc<dyn ProviderAdapter> =
        Arc::new(FakeAdapter::succeeding("fake", MediaKind::Video));
    harness(state, vec![adapter])
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    owner: Option<DbId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("authorization", format!("Bearer {}", token(owner)));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn batches_uri(project_id: DbId) -> String {
    format!("/api/v1/projects/{project_id}/generation/batches")
}

// -- health --

#[tokio::test]
async fn health_reports_store_and_executor_state() {
    let h = video_harness();
    let app = app(&h);

    let (status, json) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["accepting_batches"], true);
    assert!(json["version"].is_string());

    h.orchestrator.drain().await;
    let (_, json) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(json["accepting_batches"], false);
}

// -- auth --

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let h = video_harness();
    let body = json!({"target": "shot_video", "subject_ids": [1]});

    let (status, json) = send(&app(&h), Method::POST, &batches_uri(PROJECT), None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(h.store.tasks().is_empty());
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let h = video_harness();
    let forged = generate_access_token(
        OWNER,
        &JwtConfig {
            secret: "not-the-server-secret".into(),
            access_token_expiry_mins: 60,
        },
    )
    .unwrap();

    let request = Request::builder()
        .uri("/api/v1/generation/tasks")
        .header("authorization", format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let response = app(&h).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// -- submit and progress --

#[tokio::test]
async fn submitted_batch_is_accepted_and_completes() {
    let h = video_harness();
    let app = app(&h);

    let (status, json) = send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1, 2], "concurrency": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let data = &json["data"];
    assert!(data["batchId"].is_string());
    assert_eq!(data["lanes"], 2);
    let tasks = data["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["subjectId"], 1);

    h.orchestrator.drain().await;

    let task_id = tasks[0]["taskId"].as_i64().unwrap();
    let (status, json) = send(
        &app,
        Method::GET,
        &format!("/api/v1/generation/tasks/{task_id}"),
        Some(OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["progress"], 100);
    assert!(json["data"]["resultUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://files.example/shot_1_"));
}

#[tokio::test]
async fn another_owners_task_is_not_found() {
    let h = video_harness();
    let app = app(&h);

    let (_, json) = send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1]})),
    )
    .await;
    h.orchestrator.drain().await;
    let task_id = json["data"]["tasks"][0]["taskId"].as_i64().unwrap();

    let (status, json) = send(
        &app,
        Method::GET,
        &format!("/api/v1/generation/tasks/{task_id}"),
        Some(OWNER + 1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// -- rejections --

#[tokio::test]
async fn invalid_bodies_are_rejected_before_any_task_exists() {
    let h = video_harness();
    let app = app(&h);

    let (status, json) = send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, json) = send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1], "merge": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("max_duration"));

    let (status, _) = send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1], "concurrency": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.store.tasks().is_empty());
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let h = video_harness();

    let (status, json) = send(
        &app(&h),
        Method::POST,
        &batches_uri(999),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Project with id 999 not found");
}

#[tokio::test]
async fn missing_credentials_are_a_configuration_error() {
    let mut state = base_state("fake");
    state.projects = vec![project(Some(1), None)];
    state.shots = vec![shot(1, 1, 1, 4.0)];
    let adapter: Arc<dyn ProviderAdapter> =
        Arc::new(FakeAdapter::succeeding("fake", MediaKind::Video));
    let h = harness(state, vec![adapter]);

    let (status, json) = send(
        &app(&h),
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "CONFIGURATION_ERROR");
    assert!(h.store.tasks().is_empty());
}

// -- listings --

#[tokio::test]
async fn project_listing_filters_by_status() {
    let h = video_harness();
    let app = app(&h);

    send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1, 2, 3]})),
    )
    .await;
    h.orchestrator.drain().await;

    let uri = format!("/api/v1/projects/{PROJECT}/generation/tasks?status=completed&limit=2");
    let (status, json) = send(&app, Method::GET, &uri, Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = json["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t["status"] == TaskStatus::Completed.as_str()));

    let uri = format!("/api/v1/projects/{PROJECT}/generation/tasks?status=failed");
    let (_, json) = send(&app, Method::GET, &uri, Some(OWNER), None).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, &uri, Some(OWNER + 1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_listing_only_shows_the_callers_tasks() {
    let h = video_harness();
    let app = app(&h);

    send(
        &app,
        Method::POST,
        &batches_uri(PROJECT),
        Some(OWNER),
        Some(json!({"target": "shot_video", "subject_ids": [1]})),
    )
    .await;
    h.orchestrator.drain().await;

    let (_, mine) = send(&app, Method::GET, "/api/v1/generation/tasks", Some(OWNER), None).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);

    let (_, theirs) =
        send(&app, Method::GET, "/api/v1/generation/tasks", Some(OWNER + 1), None).await;
    assert!(theirs["data"].as_array().unwrap().is_empty());
}

// -- middleware --

#[tokio::test]
async fn responses_carry_a_request_id() {
    let h = video_harness();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(&h).oneshot(request).await.unwrap();

    let id = response.headers().get("x-request-id").unwrap();
    assert_eq!(id.to_str().unwrap().len(), 36);
}
