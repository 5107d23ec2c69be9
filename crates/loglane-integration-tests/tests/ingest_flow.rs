//! User → session → upload flow over a real SQLite database

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use common::{TestApp, body_json, log_batch};
use loglane_core::{SessionId, Store, UserId};
use loglane_ingest::IngestConfig;
use loglane_store_sqlite::SqliteStore;
use serde_json::json;

#[tokio::test]
async fn test_scenario_user_session_upload() {
    let app = TestApp::new().await;

    let user_id = app.create_user("203.0.113.7").await;
    let session_id = app.create_session(&user_id).await;

    let before = app.total();
    let response = app
        .upload(
            &session_id,
            "t1",
            json!([
                {"message": "boot"},
                {"message": "ready", "level": "info"},
                {"message": "shutdown"}
            ]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let receipt = body_json(response).await;
    assert_eq!(receipt["accepted"], 3);
    assert_eq!(receipt["total"], before + 3);
    assert_eq!(app.total(), before + 3);

    let user = app
        .store
        .get_user(&UserId::parse(&user_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.hashed_ip, app.hasher.hash("203.0.113.7").unwrap());
    assert_ne!(user.hashed_ip, "203.0.113.7");
}

#[tokio::test]
async fn test_session_row_matches_derivation() {
    let app = TestApp::new().await;
    let user_id = app.create_user("198.51.100.20").await;
    let session_id = app.create_session(&user_id).await;

    let session = app
        .store
        .get_session(&SessionId::parse(&session_id).unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(session.user_id().as_str(), user_id);
    assert_eq!(session.stream_name(), format!("stream-{}", user_id));
    assert_eq!(session.subject_name(), format!("subject-{}", session_id));
    assert_eq!(
        session.expires_at() - session.created_at(),
        Duration::days(2)
    );
    assert!(!session.enable_sharing());
}

#[tokio::test]
async fn test_rows_survive_reopen() {
    let app = TestApp::new().await;
    let user_id = app.create_user("192.0.2.1").await;
    let session_id = app.create_session(&user_id).await;
    let session_id = SessionId::parse(&session_id).unwrap();

    let original = app.store.get_session(&session_id).await.unwrap().unwrap();

    let reopened = SqliteStore::open(&app.db_path).await.unwrap();
    let loaded = reopened.get_session(&session_id).await.unwrap().unwrap();

    assert_eq!(loaded, original);
    assert_eq!(loaded.subject_name(), format!("subject-{}", session_id));
}

#[tokio::test]
async fn test_empty_batch_succeeds_without_counting() {
    let app = TestApp::new().await;
    let user_id = app.create_user("203.0.113.7").await;
    let session_id = app.create_session(&user_id).await;

    app.upload(&session_id, "warmup", log_batch(4)).await;
    let before = app.total();

    let response = app.upload(&session_id, "t1", json!([])).await;
    assert_eq!(response.status(), StatusCode::OK);

    let receipt = body_json(response).await;
    assert_eq!(receipt["accepted"], 0);
    assert_eq!(receipt["total"], before);
    assert_eq!(app.total(), before);
}

#[tokio::test]
async fn test_session_create_without_user_id_writes_nothing() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::post("/session/create")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");

    let count = row_count(&app, "sessions").await;
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_session_for_unknown_user_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::post("/session/create")
                .header("User-Id", "never-created")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(row_count(&app, "sessions").await, 0);
}

#[tokio::test]
async fn test_unverified_references_accept_any_ids() {
    let app = TestApp::with_config(IngestConfig {
        verify_references: false,
        ..IngestConfig::default()
    })
    .await;

    let session_id = app.create_session("external-user").await;
    let response = app.upload("external-session", "t1", log_batch(2)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = app
        .store
        .get_session(&SessionId::parse(&session_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.stream_name(), "stream-external-user");
    assert_eq!(app.total(), 2);
}

#[tokio::test]
async fn test_upload_to_unknown_session_rejected() {
    let app = TestApp::new().await;

    let response = app.upload("no-such-session", "t1", log_batch(3)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.total(), 0);
}

#[tokio::test]
async fn test_malformed_batch_leaves_counter_untouched() {
    let app = TestApp::new().await;
    let user_id = app.create_user("203.0.113.7").await;
    let session_id = app.create_session(&user_id).await;

    let response = app
        .upload(&session_id, "t1", json!([{"message": "ok"}, {"level": "info"}]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], 400);
    assert_eq!(app.total(), 0);
}

#[tokio::test]
async fn test_forwarded_address_when_trusted() {
    let app = TestApp::with_config(IngestConfig {
        trust_forwarded_headers: true,
        ..IngestConfig::default()
    })
    .await;

    let response = app
        .send(
            Request::post("/user/create")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let user_id = body_json(response).await["user_id"]
        .as_str()
        .unwrap()
        .to_string();

    let user = app
        .store
        .get_user(&UserId::parse(&user_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.hashed_ip, app.hasher.hash("203.0.113.9").unwrap());
}

async fn row_count(app: &TestApp, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&sql)
        .fetch_one(app.store.pool())
        .await
        .unwrap()
}
