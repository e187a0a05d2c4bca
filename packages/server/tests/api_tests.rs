//! HTTP surface over the in-memory stores.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use digest_core::common::UserId;
use digest_core::kernel::test_dependencies::MockContentSource;
use digest_core::kernel::{ProviderError, TestDependencies};
use digest_core::server::{build_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{items, Pipeline};

fn app(pipeline: &Pipeline) -> Router {
    let scheduler = Arc::new(
        pipeline
            .deps
            .drain_scheduler(pipeline.continuation.clone()),
    );
    build_app(AppState::new(None, pipeline.deps.clone(), scheduler), &[])
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_without_database_reports_skipped() {
    let pipeline = Pipeline::new(TestDependencies::new());
    let (status, body) = send(&app(&pipeline), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["status"], "skipped");
}

#[tokio::test]
async fn second_session_request_conflicts() {
    // Fetch keeps failing transiently, so the kicked-off cycle cannot close the session.
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_error("baker", ProviderError::Transient("upstream 503".to_string())),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let app = app(&pipeline);

    let (status, body) = send(&app, post_json("/api/sessions", json!({ "user_id": user }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_jobs"], 1);
    assert_eq!(body["jobs_enqueued"], 1);

    let (status, body) = send(&app, post_json("/api/sessions", json!({ "user_id": user }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("active session"));
}

#[tokio::test]
async fn drain_then_progress_reports_completion() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 2)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    digest_core::domains::sessions::start_session(user, None, &pipeline.deps)
        .await
        .unwrap();
    let app = app(&pipeline);

    let (status, report) = send(&app, post_json("/api/queue/drain", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed"], 5);
    assert_eq!(report["needs_more"], false);

    let (status, progress) = send(
        &app,
        get(&format!("/api/sessions/progress?user_id={}", user)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["percent"], 100);
    assert_eq!(progress["current_phase"], "completed");

    let (status, stats) = send(&app, get("/api/queue/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats.as_array().map(|s| s.len()), Some(3));
}

#[tokio::test]
async fn progress_for_unknown_user_is_not_found() {
    let pipeline = Pipeline::new(TestDependencies::new());
    let uri = format!("/api/sessions/progress?user_id={}", UserId::new());

    let (status, _) = send(&app(&pipeline), get(&uri)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_failed_for_unknown_session_is_not_found() {
    let pipeline = Pipeline::new(TestDependencies::new());
    let uri = format!("/api/sessions/{}/retry-failed", uuid::Uuid::new_v4());

    let (status, _) = send(&app(&pipeline), post_json(&uri, json!({}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reconcile_with_nothing_pending_is_empty() {
    let pipeline = Pipeline::new(TestDependencies::new());

    let (status, report) = send(&app(&pipeline), post_json("/api/transcripts/reconcile", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["checked"], 0);
}
