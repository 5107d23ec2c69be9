//! Common test utilities for integration tests

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
};
use loglane_ingest::{AppState, IngestConfig, IpHashAlgorithm, IpHasher, router};
use loglane_observability::Metrics;
use loglane_store_sqlite::SqliteStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

/// Full application over a SQLite file in a temp directory
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<SqliteStore>,
    pub hasher: IpHasher,
    pub db_path: PathBuf,
    router: Router,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(IngestConfig::default()).await
    }

    pub async fn with_config(config: IngestConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("loglane.db");
        let store = Arc::new(SqliteStore::open(&db_path).await.unwrap());
        let hasher = IpHasher::new(IpHashAlgorithm::HmacSha256, SECRET).unwrap();
        let state = AppState::new(
            store.clone(),
            hasher.clone(),
            Arc::new(Metrics::new().unwrap()),
            config,
        );

        Self {
            router: router(state.clone()),
            state,
            store,
            hasher,
            db_path,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// POST /user/create as if connected from `ip`
    pub async fn create_user(&self, ip: &str) -> String {
        let peer: SocketAddr = format!("{}:40000", ip).parse().unwrap();
        let response = self
            .send(
                Request::post("/user/create")
                    .extension(ConnectInfo(peer))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["user_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn create_session(&self, user_id: &str) -> String {
        let response = self
            .send(
                Request::post("/session/create")
                    .header("User-Id", user_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn upload(&self, session_id: &str, tag: &str, logs: serde_json::Value) -> Response {
        self.send(upload_request(session_id, tag, logs)).await
    }

    pub fn total(&self) -> u64 {
        self.state.counter.total().unwrap()
    }
}

#[allow(dead_code)]
pub fn upload_request(session_id: &str, tag: &str, logs: serde_json::Value) -> Request<Body> {
    Request::post(format!(
        "/session/upload?session_id={}&tag={}",
        session_id, tag
    ))
    .header("content-type", "application/json")
    .body(Body::from(logs.to_string()))
    .unwrap()
}

#[allow(dead_code)]
pub fn log_batch(n: usize) -> serde_json::Value {
    serde_json::Value::Array(
        (0..n)
            .map(|i| serde_json::json!({ "message": format!("entry {}", i) }))
            .collect(),
    )
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
